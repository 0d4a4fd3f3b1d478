use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the encoder.
///
/// `IncompatiblePersistedState` and `NumericDegeneracy` are recovered locally
/// and only ever reach the caller through `tracing` warnings.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("incompatible persisted state: {0}")]
    IncompatiblePersistedState(String),
    #[error("numeric degeneracy for term {term}: estimated df {estimate} outside [0, {doc_num}], clamped")]
    NumericDegeneracy { term: usize, estimate: f64, doc_num: u64 },
    #[error("persistence io failure at {path}: {source}")]
    PersistenceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("codec error: {0}")]
    Codec(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("encoder is not fitted")]
    NotFitted,
    #[error("projection basis for column {0} is unavailable until the next update")]
    BasisUnavailable(String),
    #[error("corpus history of column {0} is not retained")]
    HistoryUnavailable(String),
    #[error("decomposition failed: {0}")]
    Decompose(#[from] DecomposeError),
}

/// Errors from the low-rank decomposition primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecomposeError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("invalid shape: product {product} does not match length {length}")]
    InvalidShape { product: usize, length: usize },
}

impl From<serde_cbor::Error> for EncoderError {
    fn from(err: serde_cbor::Error) -> Self {
        EncoderError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for EncoderError {
    fn from(err: serde_json::Error) -> Self {
        EncoderError::Codec(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EncoderError>;
