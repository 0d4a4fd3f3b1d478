pub mod analyzer;
pub mod idf;
pub mod term;
pub mod vocabulary;

use ahash::RandomState;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::EncoderParams;
use crate::error::DecomposeError;
use crate::utils::math::sparse::SparseRow;
use self::{analyzer::Analyzer, idf::TermStatistics, term::TermFrequency, vocabulary::Vocabulary};

/// Vocabulary and term statistics fit on one batch, over the batch's local ids
#[derive(Debug, Clone, Default)]
pub struct BatchFit {
    pub vocabulary: Vocabulary,
    pub stats: TermStatistics,
}

/// Turns analyzed documents into vocabulary fits and term-weighted rows.
#[derive(Debug, Clone)]
pub struct BatchVectorizer {
    analyzer: Analyzer,
    max_features: Option<usize>,
    use_idf: bool,
}

impl BatchVectorizer {
    pub fn new(params: &EncoderParams) -> Self {
        Self {
            analyzer: Analyzer::new(params.max_ngram_order),
            max_features: params.max_features,
            use_idf: params.use_idf_weighting,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Fit a local vocabulary and idf on one batch.
    ///
    /// Ids follow first-seen order. With `max_features` only the most frequent
    /// terms survive (ties keep first-seen order); the rest become stop words.
    pub fn fit(&self, docs: &[TermFrequency]) -> BatchFit {
        // term -> (corpus count, document frequency)
        let mut counts: IndexMap<&str, (u64, u64), RandomState> = IndexMap::with_hasher(RandomState::new());
        for doc in docs {
            for (term, count) in doc.iter() {
                let entry = counts.entry(term).or_insert((0, 0));
                entry.0 += count;
                entry.1 += 1;
            }
        }

        let keep: Vec<bool> = match self.max_features {
            Some(max) if max < counts.len() => {
                let mut order: Vec<usize> = (0..counts.len()).collect();
                // stable, so equal counts stay in first-seen order
                order.sort_by(|&a, &b| counts[b].0.cmp(&counts[a].0));
                let mut keep = vec![false; counts.len()];
                for &idx in order.iter().take(max) {
                    keep[idx] = true;
                }
                keep
            }
            _ => vec![true; counts.len()],
        };

        let mut vocabulary = Vocabulary::new();
        let mut doc_freqs = Vec::with_capacity(counts.len());
        for ((term, &(_, df)), &kept) in counts.iter().zip(&keep) {
            if kept {
                vocabulary.insert(term.to_string());
                doc_freqs.push(df);
            }
        }
        for ((term, _), &kept) in counts.iter().zip(&keep) {
            if !kept {
                vocabulary.add_stop_word(term.to_string());
            }
        }
        let stats = TermStatistics::from_doc_freqs(docs.len() as u64, &doc_freqs);
        tracing::debug!(docs = docs.len(), terms = vocabulary.len(), cut = counts.len() - vocabulary.len(), "batch fit");
        BatchFit { vocabulary, stats }
    }

    /// Term-weighted row of one document, `vocabulary.len()` wide.
    /// Terms outside the vocabulary are ignored.
    pub fn weight(
        &self,
        doc: &TermFrequency,
        vocabulary: &Vocabulary,
        stats: &TermStatistics,
    ) -> Result<SparseRow<f64>, DecomposeError> {
        if stats.len() != vocabulary.len() {
            return Err(DecomposeError::DimensionMismatch {
                expected: vocabulary.len(),
                got: stats.len(),
            });
        }
        let pairs: Vec<(usize, f64)> = doc
            .iter()
            .filter_map(|(term, count)| {
                let id = vocabulary.id(term)?;
                let weight = if self.use_idf {
                    count as f64 * stats.idf[id]
                } else {
                    count as f64
                };
                Some((id, weight))
            })
            .collect();
        let pairs = if self.use_idf {
            let norm = pairs.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                pairs.into_iter().map(|(id, w)| (id, w / norm)).collect()
            } else {
                pairs
            }
        } else {
            pairs
        };
        SparseRow::from_pairs(vocabulary.len(), pairs)
    }

    pub fn weight_batch(
        &self,
        docs: &[TermFrequency],
        vocabulary: &Vocabulary,
        stats: &TermStatistics,
    ) -> Result<Vec<SparseRow<f64>>, DecomposeError> {
        docs.par_iter()
            .map(|doc| self.weight(doc, vocabulary, stats))
            .collect()
    }
}
