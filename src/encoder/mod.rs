pub mod frame;
pub mod state;

use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::{EncoderParams, PersistencePaths};
use crate::error::{EncoderError, Result};
use crate::export::{ArtifactGroup, ScoringArtifactSink};
use crate::persistence::{self, PersistedState};
use crate::projection::{AdaptationPolicy, ProjectionBasis};
use crate::utils::math::sparse::{CorpusMatrix, SparseRow};
use crate::vectorizer::{term::TermFrequency, BatchVectorizer};
use self::frame::{EncodedMatrix, TextFrame};
use self::state::{ColumnState, EncoderState};

/// Where an encoder instance stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderPhase {
    /// nothing fit or loaded yet
    Uninitialized,
    /// every column can encode
    Ready,
    /// some column lost its basis and waits for an exact refit
    Degraded,
}

/// Continuous Text Encoder
/// Encodes text columns into `k` dense values per column and keeps the
/// statistics needed to absorb later batches without revisiting old ones.
///
/// The live state is an immutable snapshot behind an `Arc`. `update` builds
/// the next snapshot from the current one, persists it, and only then swaps
/// it in, so a failed call leaves both memory and disk at the last good state.
#[derive(Debug)]
pub struct ContinuousTextEncoder {
    params: EncoderParams,
    paths: PersistencePaths,
    vectorizer: BatchVectorizer,
    state: Option<Arc<EncoderState>>,
}

impl ContinuousTextEncoder {
    /// Create an encoder, resuming from `paths.load` when set.
    pub fn new(params: EncoderParams, paths: PersistencePaths) -> Result<Self> {
        let persisted = match &paths.load {
            Some(path) => Some(persistence::load(path)?),
            None => None,
        };
        Self::with_persisted(params, paths, persisted)
    }

    /// Create an encoder from an already decoded blob.
    pub fn with_persisted(params: EncoderParams, paths: PersistencePaths, persisted: Option<PersistedState>) -> Result<Self> {
        params.validate()?;
        let vectorizer = BatchVectorizer::new(&params);
        let mut encoder = Self {
            params,
            paths,
            vectorizer,
            state: None,
        };
        if let Some(persisted) = persisted {
            encoder.state = encoder.install(persisted)?.map(Arc::new);
        }
        Ok(encoder)
    }

    fn install(&mut self, persisted: PersistedState) -> Result<Option<EncoderState>> {
        let k = self.params.reduced_dimension;
        match persisted {
            PersistedState::Fresh(mut state) => {
                if let Some((name, _)) = state.columns.iter().find(|(_, c)| !c.is_consistent()) {
                    return Err(EncoderError::Codec(format!("column {name} has mismatched widths")));
                }
                let configured = self.params.vectorizer_settings();
                match state.vectorizer {
                    Some(saved) if saved != configured => {
                        let adopted = self.params.with_vectorizer_settings(saved);
                        adopted
                            .validate()
                            .map_err(|err| EncoderError::Codec(format!("persisted vectorizer settings: {err}")))?;
                        let err = EncoderError::IncompatiblePersistedState(format!(
                            "blob was vectorized with {saved:?}, configured {configured:?}; keeping the persisted settings"
                        ));
                        tracing::warn!("{err}");
                        self.vectorizer = BatchVectorizer::new(&adopted);
                        self.params = adopted;
                    }
                    Some(_) => {}
                    None => state.vectorizer = Some(configured),
                }
                if state.reduced_dimension != k {
                    let err = EncoderError::IncompatiblePersistedState(format!(
                        "blob was fit with reduced_dimension {}, configured {k}; bases dropped until the next update",
                        state.reduced_dimension
                    ));
                    tracing::warn!("{err}");
                    for column in state.columns.values_mut() {
                        column.basis = None;
                    }
                    state.reduced_dimension = k;
                }
                Ok(Some(state))
            }
            PersistedState::LegacyBasisOnly(basis) => {
                let err = EncoderError::IncompatiblePersistedState(format!(
                    "legacy blob holds a {}x{} basis without vocabulary; the next update fits from scratch",
                    basis.k(),
                    basis.n_terms()
                ));
                tracing::warn!("{err}");
                Ok(None)
            }
        }
    }

    pub fn params(&self) -> &EncoderParams {
        &self.params
    }

    pub fn paths(&self) -> &PersistencePaths {
        &self.paths
    }

    pub fn phase(&self) -> EncoderPhase {
        match self.state.as_deref() {
            None => EncoderPhase::Uninitialized,
            Some(state) if state.is_degraded() => EncoderPhase::Degraded,
            Some(_) => EncoderPhase::Ready,
        }
    }

    /// Current snapshot, for readers that must not observe an update
    pub fn snapshot(&self) -> Option<Arc<EncoderState>> {
        self.state.clone()
    }

    /// Fit on the first batch, update on every later one with the
    /// configured default policy.
    pub fn fit_transform(&mut self, batch: &TextFrame, labels: Option<&[f64]>) -> Result<EncodedMatrix> {
        if self.state.is_none() {
            return self.fit(batch, labels);
        }
        let policy = self.params.default_policy;
        self.update(batch, labels, policy)
    }

    /// Fit vocabulary, statistics and basis from scratch, replacing any state.
    pub fn fit(&mut self, batch: &TextFrame, labels: Option<&[f64]>) -> Result<EncodedMatrix> {
        let n_rows = self.check_batch(batch, labels, None)?;
        if n_rows == 0 {
            return Err(EncoderError::MalformedInput("cannot fit on an empty batch".to_string()));
        }
        let k = self.params.reduced_dimension;
        let mut columns = IndexMap::with_capacity(batch.n_columns());
        let mut encoded = Vec::with_capacity(batch.n_columns());
        for name in batch.column_names() {
            let docs = self.analyze(batch, name);
            let (column, rows) = self.fit_column(&docs)?;
            if let Some(basis) = column.basis.as_ref() {
                encoded.push((name, project_rows(basis, &rows)));
            }
            columns.insert(name.to_string(), column);
        }
        let mut next = EncoderState {
            reduced_dimension: k,
            doc_num: n_rows as u64,
            columns,
            labels: None,
            vectorizer: Some(self.params.vectorizer_settings()),
        };
        next.labels = next_labels(None, next.history_rows(), labels);
        self.commit(next)?;
        tracing::info!(docs = n_rows, columns = encoded.len(), k, "encoder fit");
        Ok(EncodedMatrix::from_columns(n_rows, k, encoded))
    }

    /// Absorb a new batch into the current state and encode it.
    ///
    /// Vocabulary and idf are merged, then the basis is either refit on the
    /// retained corpus (`ExactRefit`) or blended toward the batch
    /// (`IncrementalBlend`). Columns without a basis are always refit.
    pub fn update(&mut self, batch: &TextFrame, labels: Option<&[f64]>, policy: AdaptationPolicy) -> Result<EncodedMatrix> {
        let Some(current) = self.state.clone() else {
            return self.fit(batch, labels);
        };
        let n_rows = self.check_batch(batch, labels, Some(&current))?;
        let k = self.params.reduced_dimension;
        if n_rows == 0 {
            tracing::debug!("empty batch, state unchanged");
            let empty = current.columns.keys().map(|name| (name.as_str(), Vec::new())).collect();
            return Ok(EncodedMatrix::from_columns(0, k, empty));
        }

        let mut columns = IndexMap::with_capacity(current.columns.len());
        let mut encoded = Vec::with_capacity(current.columns.len());
        for (name, column) in &current.columns {
            let docs = self.analyze(batch, name);
            let (next, rows) = self.update_column(name, column, &docs, policy)?;
            if let Some(basis) = next.basis.as_ref() {
                encoded.push((name.as_str(), project_rows(basis, &rows)));
            }
            columns.insert(name.clone(), next);
        }
        let mut next = EncoderState {
            reduced_dimension: k,
            doc_num: current.doc_num + n_rows as u64,
            columns,
            labels: None,
            vectorizer: Some(self.params.vectorizer_settings()),
        };
        next.labels = next_labels(current.labels.as_ref(), next.history_rows(), labels);
        if labels.is_some() && next.labels.is_none() {
            tracing::debug!("label history dropped, corpus history is not retained");
        }
        self.commit(next)?;
        tracing::info!(docs = n_rows, total_docs = current.doc_num + n_rows as u64, ?policy, "encoder updated");
        Ok(EncodedMatrix::from_columns(n_rows, k, encoded))
    }

    /// Encode a batch with the current state, without changing it.
    /// Unknown terms contribute nothing.
    pub fn transform(&self, batch: &TextFrame) -> Result<EncodedMatrix> {
        let state = self.state.as_deref().ok_or(EncoderError::NotFitted)?;
        self.transform_with(state, batch)
    }

    /// Encode a batch against a snapshot taken earlier with `snapshot`.
    pub fn transform_with(&self, state: &EncoderState, batch: &TextFrame) -> Result<EncodedMatrix> {
        let n_rows = self.check_batch(batch, None, Some(state))?;
        let mut encoded = Vec::with_capacity(state.columns.len());
        for (name, column) in &state.columns {
            let basis = column
                .basis
                .as_ref()
                .ok_or_else(|| EncoderError::BasisUnavailable(name.clone()))?;
            let docs = self.analyze(batch, name);
            let rows = self.vectorizer.weight_batch(&docs, &column.vocabulary, &column.stats)?;
            encoded.push((name.as_str(), project_rows(basis, &rows)));
        }
        Ok(EncodedMatrix::from_columns(n_rows, state.reduced_dimension, encoded))
    }

    /// Re-encode every retained corpus row with the current basis, together
    /// with the aligned label history.
    pub fn encode_history(&self) -> Result<(EncodedMatrix, Option<Vec<f64>>)> {
        let state = self.state.as_deref().ok_or(EncoderError::NotFitted)?;
        let mut encoded = Vec::with_capacity(state.columns.len());
        for (name, column) in &state.columns {
            let corpus = column
                .corpus
                .as_ref()
                .ok_or_else(|| EncoderError::HistoryUnavailable(name.clone()))?;
            let basis = column
                .basis
                .as_ref()
                .ok_or_else(|| EncoderError::BasisUnavailable(name.clone()))?;
            encoded.push((name.as_str(), project_rows(basis, corpus.rows())));
        }
        let n_rows = state
            .history_rows()
            .ok_or_else(|| EncoderError::HistoryUnavailable("*".to_string()))?;
        Ok((
            EncodedMatrix::from_columns(n_rows, state.reduced_dimension, encoded),
            state.labels.clone(),
        ))
    }

    /// Hand every column's vocabulary, statistics and basis to a scoring sink.
    pub fn export(&self, sink: &mut dyn ScoringArtifactSink, group: &ArtifactGroup) -> Result<()> {
        let state = self.state.as_deref().ok_or(EncoderError::NotFitted)?;
        for (name, column) in &state.columns {
            let basis = column
                .basis
                .as_ref()
                .ok_or_else(|| EncoderError::BasisUnavailable(name.clone()))?;
            sink.write_column(group, name, &column.vocabulary, &column.stats, basis)?;
        }
        Ok(())
    }

    /// Delete the blob at the save path and forget all state.
    pub fn discard(&mut self) -> Result<()> {
        if let Some(path) = &self.paths.save {
            persistence::discard(path)?;
        }
        self.state = None;
        tracing::info!("encoder state discarded");
        Ok(())
    }

    fn analyze(&self, batch: &TextFrame, column: &str) -> Vec<TermFrequency> {
        let cells = batch.column(column).unwrap_or(&[]);
        self.vectorizer.analyzer().analyze_batch(cells)
    }

    fn fit_column(&self, docs: &[TermFrequency]) -> Result<(ColumnState, Vec<SparseRow<f64>>)> {
        let fit = self.vectorizer.fit(docs);
        let width = fit.vocabulary.len();
        let rows = self.vectorizer.weight_batch(docs, &fit.vocabulary, &fit.stats)?;
        let basis = ProjectionBasis::refit(None, &rows, width, self.params.reduced_dimension);
        let mut corpus = CorpusMatrix::new(width);
        corpus.append_rows(rows.iter().cloned())?;
        let column = ColumnState {
            vocabulary: fit.vocabulary,
            stats: fit.stats,
            corpus: Some(corpus),
            basis: Some(basis),
        };
        Ok((column, rows))
    }

    fn update_column(
        &self,
        name: &str,
        column: &ColumnState,
        docs: &[TermFrequency],
        policy: AdaptationPolicy,
    ) -> Result<(ColumnState, Vec<SparseRow<f64>>)> {
        let batch_fit = self.vectorizer.fit(docs);
        let (vocabulary, local_to_global) = column.vocabulary.merge(&batch_fit.vocabulary);
        let stats = column.stats.merge(&batch_fit.stats, &local_to_global, vocabulary.len());
        let width = vocabulary.len();
        let rows = self.vectorizer.weight_batch(docs, &vocabulary, &stats)?;

        let (corpus, basis) = match (policy, column.basis.as_ref()) {
            (AdaptationPolicy::IncrementalBlend, Some(old)) => {
                let mut basis = old.blend(&rows, width, self.params.blend_step_size);
                if self.params.orthonormalize_blend {
                    basis.orthonormalize();
                }
                (None, basis)
            }
            (policy, prior) => {
                if policy == AdaptationPolicy::IncrementalBlend {
                    tracing::info!(column = name, "no basis to blend, refitting exactly");
                }
                let mut corpus = match column.corpus.clone() {
                    Some(corpus) => corpus,
                    None => {
                        tracing::warn!(column = name, "corpus history not retained, refitting on the current batch");
                        CorpusMatrix::new(width)
                    }
                };
                corpus.widen(width);
                corpus.append_rows(rows.iter().cloned())?;
                let basis = ProjectionBasis::refit(prior, corpus.rows(), width, self.params.reduced_dimension);
                (Some(corpus), basis)
            }
        };
        tracing::debug!(
            column = name,
            terms = width,
            new_terms = width - column.width(),
            retained_rows = corpus.as_ref().map_or(0, CorpusMatrix::n_rows),
            "column updated"
        );
        let next = ColumnState {
            vocabulary,
            stats,
            corpus,
            basis: Some(basis),
        };
        Ok((next, rows))
    }

    /// Reject malformed batches before anything is computed
    fn check_batch(&self, batch: &TextFrame, labels: Option<&[f64]>, state: Option<&EncoderState>) -> Result<usize> {
        let n_rows = batch.n_rows()?;
        if let Some(labels) = labels {
            if labels.len() != n_rows {
                return Err(EncoderError::MalformedInput(format!(
                    "{} labels for {n_rows} rows",
                    labels.len()
                )));
            }
        }
        if let Some(state) = state {
            let same_columns = batch.n_columns() == state.columns.len()
                && state.columns.keys().all(|name| batch.column(name).is_some());
            if !same_columns {
                let expected: Vec<&str> = state.columns.keys().map(String::as_str).collect();
                let got: Vec<&str> = batch.column_names().collect();
                return Err(EncoderError::MalformedInput(format!(
                    "expected columns {expected:?}, got {got:?}"
                )));
            }
        }
        Ok(n_rows)
    }

    fn commit(&mut self, next: EncoderState) -> Result<()> {
        debug_assert!(next.columns.values().all(ColumnState::is_consistent));
        if let Some(path) = &self.paths.save {
            persistence::save(path, &next)?;
        }
        self.state = Some(Arc::new(next));
        Ok(())
    }
}

fn project_rows(basis: &ProjectionBasis, rows: &[SparseRow<f64>]) -> Vec<Vec<f64>> {
    rows.par_iter().map(|row| basis.project(row)).collect()
}

/// Label history after a call, kept only while it lines up with the corpus rows
fn next_labels(previous: Option<&Vec<f64>>, history_rows: Option<usize>, labels: Option<&[f64]>) -> Option<Vec<f64>> {
    let (n, labels) = (history_rows?, labels?);
    match previous {
        Some(prev) if prev.len() + labels.len() == n => {
            let mut out = prev.clone();
            out.extend_from_slice(labels);
            Some(out)
        }
        _ if labels.len() == n => Some(labels.to_vec()),
        _ => None,
    }
}
