use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EncoderError, Result};
use crate::projection::AdaptationPolicy;

/// Environment variable naming the blob to resume from
pub const LOAD_ENV: &str = "TEXT_ENCODER_LOAD";
/// Environment variable naming the blob to persist into
pub const SAVE_ENV: &str = "TEXT_ENCODER_SAVE";
/// Host override key for the load path
pub const LOAD_KEY: &str = "text_encoder_load";
/// Host override key for the save path
pub const SAVE_KEY: &str = "text_encoder_save";

/// Hyperparameters of one encoder instance.
///
/// `reduced_dimension` is fixed for the lifetime of a persisted state;
/// loading a blob fit with a different value degrades to an exact refit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderParams {
    /// cap on the per-batch vocabulary size, `None` is unbounded
    pub max_features: Option<usize>,
    /// weight counts by idf and L2-normalize rows
    pub use_idf_weighting: bool,
    /// highest n-gram order, 1..=3
    pub max_ngram_order: usize,
    /// k, the width of each column's embedding
    pub reduced_dimension: usize,
    /// step size of the incremental blend, 0.0..=1.0
    pub blend_step_size: f64,
    /// policy used by `fit_transform` on a ready encoder
    pub default_policy: AdaptationPolicy,
    /// re-orthonormalize basis rows after a blend
    pub orthonormalize_blend: bool,
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self {
            max_features: None,
            use_idf_weighting: true,
            max_ngram_order: 1,
            reduced_dimension: 50,
            blend_step_size: 0.1,
            default_policy: AdaptationPolicy::ExactRefit,
            orthonormalize_blend: false,
        }
    }
}

impl EncoderParams {
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.max_ngram_order) {
            return Err(EncoderError::InvalidConfig(format!(
                "max_ngram_order must be 1, 2 or 3, got {}",
                self.max_ngram_order
            )));
        }
        if self.reduced_dimension == 0 {
            return Err(EncoderError::InvalidConfig(
                "reduced_dimension must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.blend_step_size) {
            return Err(EncoderError::InvalidConfig(format!(
                "blend_step_size must lie in [0, 1], got {}",
                self.blend_step_size
            )));
        }
        if self.max_features == Some(0) {
            return Err(EncoderError::InvalidConfig(
                "max_features must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn vectorizer_settings(&self) -> VectorizerSettings {
        VectorizerSettings {
            max_features: self.max_features,
            use_idf_weighting: self.use_idf_weighting,
            max_ngram_order: self.max_ngram_order,
        }
    }

    /// Copy of these params with the vectorizer part replaced
    pub fn with_vectorizer_settings(&self, settings: VectorizerSettings) -> Self {
        Self {
            max_features: settings.max_features,
            use_idf_weighting: settings.use_idf_weighting,
            max_ngram_order: settings.max_ngram_order,
            ..self.clone()
        }
    }
}

/// The part of `EncoderParams` that decides how text becomes term rows.
/// A persisted state carries the values it was fit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizerSettings {
    pub max_features: Option<usize>,
    pub use_idf_weighting: bool,
    pub max_ngram_order: usize,
}

/// Where the encoder resumes from and where it persists to.
/// An absent load path means a fresh start, an absent save path means
/// in-memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistencePaths {
    pub load: Option<PathBuf>,
    pub save: Option<PathBuf>,
}

impl PersistencePaths {
    pub fn new(load: Option<PathBuf>, save: Option<PathBuf>) -> Self {
        Self { load, save }
    }

    /// Read `TEXT_ENCODER_LOAD` / `TEXT_ENCODER_SAVE`
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            load: read(LOAD_ENV),
            save: read(SAVE_ENV),
        }
    }

    /// Parse the host's override object, e.g.
    /// `{"text_encoder_load": "/tmp/a.cbor", "text_encoder_save": "/tmp/b.cbor"}`.
    /// Unknown keys are ignored.
    pub fn from_overrides(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let read = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        };
        Ok(Self {
            load: read(LOAD_KEY),
            save: read(SAVE_KEY),
        })
    }
}
