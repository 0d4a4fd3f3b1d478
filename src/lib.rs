/// This crate is an updatable text encoder built on TF-IDF and truncated SVD.
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod persistence;
pub mod projection;
pub mod utils;
pub mod vectorizer;

/// Continuous Text Encoder
/// The top-level struct of this crate. It turns text columns into `k` dense
/// values per column and absorbs later batches without revisiting old data.
///
/// Internally, it holds:
/// - A vocabulary per column, with stable term ids
/// - Smoothed idf statistics that can be merged across batches
/// - The retained corpus matrix (exact refit only)
/// - A `k x V` projection basis per column
///
/// The state is an immutable snapshot behind an `Arc`; readers may keep a
/// snapshot while an update builds and swaps in the next one.
///
/// # Persistence
/// When a save path is configured every successful fit or update writes the
/// new state atomically before it becomes visible.
pub use encoder::{ContinuousTextEncoder, EncoderPhase};

/// Input and output tables
/// - `TextFrame`: named text columns of equal length, cells may be missing
/// - `EncodedMatrix`: encoded rows with `{column}_svd{i}` feature names
pub use encoder::frame::{EncodedMatrix, TextFrame};

/// Snapshot of a fitted encoder, per column and as a whole.
pub use encoder::state::{ColumnState, EncoderState};

/// Encoder configuration
/// `EncoderParams` holds the vectorizer and basis settings, `PersistencePaths`
/// the optional load and save locations.
pub use config::{EncoderParams, PersistencePaths};

/// Basis adaptation
/// `AdaptationPolicy` selects exact refit or incremental blend on update.
/// `ProjectionBasis` is the `k x V` matrix both produce.
pub use projection::{AdaptationPolicy, ProjectionBasis};

/// Vocabulary with stable ids and a merge that returns the local to global id map.
pub use vectorizer::vocabulary::Vocabulary;

/// Document count and smoothed idf per term.
/// Two statistics merge by recovering document frequencies from idf.
pub use vectorizer::idf::TermStatistics;

/// Term Frequency structure
/// Counts of each term within one document, in first-seen order.
pub use vectorizer::term::TermFrequency;

/// Sparse term-weighted rows kept for exact refits.
pub use utils::math::sparse::{CorpusMatrix, SparseRow};

/// Decoded blob contents.
pub use persistence::PersistedState;

pub use error::{DecomposeError, EncoderError, Result};

/// Scoring hand-off
/// Implement `ScoringArtifactSink` to receive every fitted column, or use
/// `JsonArtifactSink` to write them as JSON.
pub use export::{ArtifactGroup, ColumnArtifact, JsonArtifactSink, ScoringArtifactSink};
