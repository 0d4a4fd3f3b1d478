use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::VectorizerSettings;
use crate::projection::ProjectionBasis;
use crate::utils::math::sparse::CorpusMatrix;
use crate::vectorizer::{idf::TermStatistics, vocabulary::Vocabulary};

/// Everything one text column needs to encode and to be updated.
///
/// `vocabulary`, `stats` and `basis` always agree on `V`; `corpus` is absent
/// once an incremental blend has run, and `basis` is absent while the column
/// waits for an exact refit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnState {
    pub vocabulary: Vocabulary,
    pub stats: TermStatistics,
    pub corpus: Option<CorpusMatrix>,
    pub basis: Option<ProjectionBasis>,
}

impl ColumnState {
    /// Width shared by vocabulary, statistics, corpus and basis
    pub fn width(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_consistent(&self) -> bool {
        let v = self.width();
        self.stats.len() == v
            && self.corpus.as_ref().map_or(true, |c| c.n_cols() == v)
            && self.basis.as_ref().map_or(true, |b| b.n_terms() == v)
    }
}

/// One immutable snapshot of an encoder. Updates build a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    /// k every column basis is fit with
    pub reduced_dimension: usize,
    /// documents seen across all calls
    pub doc_num: u64,
    /// per text column, in host column order
    pub columns: IndexMap<String, ColumnState>,
    /// targets aligned 1:1 with the corpus rows, when the host sends them
    pub labels: Option<Vec<f64>>,
    /// settings every column was vectorized with; absent in blobs that predate it
    #[serde(default)]
    pub vectorizer: Option<VectorizerSettings>,
}

impl EncoderState {
    /// Rows held by every column's corpus, `None` when any column dropped it
    /// or the columns disagree.
    pub fn history_rows(&self) -> Option<usize> {
        let mut rows = None;
        for column in self.columns.values() {
            let n = column.corpus.as_ref()?.n_rows();
            match rows {
                None => rows = Some(n),
                Some(prev) if prev != n => return None,
                Some(_) => {}
            }
        }
        rows
    }

    /// Any column without a basis
    pub fn is_degraded(&self) -> bool {
        self.columns.values().any(|c| c.basis.is_none())
    }
}
