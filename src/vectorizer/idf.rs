use serde::{Deserialize, Serialize};

use crate::error::EncoderError;

/// Per-term smoothed idf aligned with vocabulary ids, and the number of
/// documents it was estimated over.
///
/// `idf[i] = ln((N + 1) / (df[i] + 1)) + 1`, so the pair `(doc_num, idf)` is
/// all that is needed to recover document frequencies for a later merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermStatistics {
    pub doc_num: u64,
    pub idf: Vec<f64>,
}

impl TermStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from document frequencies
    pub fn from_doc_freqs(doc_num: u64, doc_freqs: &[u64]) -> Self {
        Self {
            doc_num,
            idf: doc_freqs.iter().map(|&df| idf_calc(doc_num, df as f64)).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// Recover document frequencies, clamped into `[0, N]`.
    pub fn doc_freqs(&self) -> Vec<u64> {
        self.idf
            .iter()
            .enumerate()
            .map(|(term, &idf)| inverse_idf_checked(term, idf, self.doc_num))
            .collect()
    }

    /// Merge statistics fit on a new batch into these ones.
    ///
    /// # Arguments
    /// * `batch` - statistics over the batch's local vocabulary
    /// * `local_to_global` - merged id of each local term, from `Vocabulary::merge`
    /// * `merged_len` - size of the merged vocabulary
    pub fn merge(&self, batch: &TermStatistics, local_to_global: &[usize], merged_len: usize) -> TermStatistics {
        debug_assert_eq!(batch.len(), local_to_global.len());
        let mut doc_freqs = self.doc_freqs();
        doc_freqs.resize(merged_len, 0);
        for (local, df) in batch.doc_freqs().into_iter().enumerate() {
            doc_freqs[local_to_global[local]] += df;
        }
        let doc_num = self.doc_num + batch.doc_num;
        Self::from_doc_freqs(doc_num, &doc_freqs)
    }
}

/// Smoothed idf of a term seen in `doc_freq` of `doc_num` documents
#[inline]
pub fn idf_calc(doc_num: u64, doc_freq: f64) -> f64 {
    ((doc_num as f64 + 1.0) / (doc_freq + 1.0)).ln() + 1.0
}

/// Raw inverse of `idf_calc`, rounded to the nearest count but not clamped
#[inline]
pub fn inverse_idf(idf: f64, doc_num: u64) -> f64 {
    ((doc_num as f64 + 1.0) / (idf - 1.0).exp()).round() - 1.0
}

/// Inverse of `idf_calc` clamped into `[0, N]`, warning when clamping fires.
pub fn inverse_idf_checked(term: usize, idf: f64, doc_num: u64) -> u64 {
    let (doc_freq, degeneracy) = clamped_doc_freq(term, idf, doc_num);
    if let Some(err) = degeneracy {
        tracing::warn!("{err}");
    }
    doc_freq
}

/// Clamped inverse of `idf_calc`, plus the `NumericDegeneracy` to report when
/// the raw estimate fell outside `[0, N]`.
pub fn clamped_doc_freq(term: usize, idf: f64, doc_num: u64) -> (u64, Option<EncoderError>) {
    let estimate = inverse_idf(idf, doc_num);
    if estimate.is_finite() && estimate >= 0.0 && estimate <= doc_num as f64 {
        return (estimate as u64, None);
    }
    let clamped = if estimate.is_nan() || estimate < 0.0 { 0 } else { doc_num };
    (clamped, Some(EncoderError::NumericDegeneracy { term, estimate, doc_num }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn inverse_round_trips_every_admissible_df() {
        for n in [1u64, 2, 3, 10, 97, 1000, 123_457] {
            let step = (n / 50).max(1);
            let mut df = 0;
            while df <= n {
                let idf = idf_calc(n, df as f64);
                let back = inverse_idf(idf, n);
                assert!((back - df as f64).abs() <= 1.0, "n={n} df={df} back={back}");
                df += step;
            }
            let back = inverse_idf(idf_calc(n, n as f64), n);
            assert_eq!(back, n as f64);
        }
    }

    #[test]
    fn idf_of_one_inverts_to_doc_num() {
        for n in [1u64, 5, 1_000_000] {
            assert_eq!(inverse_idf_checked(0, 1.0, n), n);
        }
    }

    #[test]
    fn out_of_range_estimates_are_clamped() {
        // idf below 1 implies df > N
        assert_eq!(inverse_idf_checked(0, 0.2, 10), 10);
        // huge idf implies df < 0
        assert_eq!(inverse_idf_checked(0, 50.0, 10), 0);
        assert_eq!(inverse_idf_checked(0, f64::NAN, 10), 0);
    }

    #[test]
    fn clamping_reports_numeric_degeneracy() {
        let (df, err) = clamped_doc_freq(4, 0.2, 10);
        assert_eq!(df, 10);
        match err {
            Some(EncoderError::NumericDegeneracy { term, estimate, doc_num }) => {
                assert_eq!(term, 4);
                assert_eq!(doc_num, 10);
                assert!(estimate > 10.0);
            }
            other => panic!("expected NumericDegeneracy, got {other:?}"),
        }

        let (df, err) = clamped_doc_freq(1, f64::NAN, 10);
        assert_eq!(df, 0);
        assert!(matches!(err, Some(EncoderError::NumericDegeneracy { term: 1, .. })));

        let (df, err) = clamped_doc_freq(0, idf_calc(10, 3.0), 10);
        assert_eq!(df, 3);
        assert!(err.is_none());
    }

    #[derive(Clone, Default)]
    struct WarnCapture(Arc<Mutex<Vec<String>>>);

    struct MessageField(String);

    impl tracing::field::Visit for MessageField {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl tracing::Subscriber for WarnCapture {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() == tracing::Level::WARN {
                let mut message = MessageField(String::new());
                event.record(&mut message);
                self.0.lock().unwrap().push(message.0);
            }
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn clamping_emits_a_warning() {
        let capture = WarnCapture::default();
        let stats = TermStatistics {
            doc_num: 10,
            idf: vec![idf_calc(10, 2.0), 0.2],
        };
        let doc_freqs = tracing::subscriber::with_default(capture.clone(), || stats.doc_freqs());
        assert_eq!(doc_freqs, vec![2, 10]);

        let warnings = capture.0.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("numeric degeneracy"), "{}", warnings[0]);
        assert!(warnings[0].contains("term 1"), "{}", warnings[0]);
    }

    #[test]
    fn merge_adds_doc_counts_and_frequencies() {
        // cat dog bird over ["cat dog", "dog bird"]
        let old = TermStatistics::from_doc_freqs(2, &[1, 2, 1]);
        // bird fish over ["bird bird fish"]
        let batch = TermStatistics::from_doc_freqs(1, &[1, 1]);
        let merged = old.merge(&batch, &[2, 3], 4);

        assert_eq!(merged.doc_num, 3);
        assert_eq!(merged.doc_freqs(), vec![1, 2, 2, 1]);
        let expected_fish = (4.0f64 / 2.0).ln() + 1.0;
        assert!((merged.idf[3] - expected_fish).abs() < 1e-12);
    }

    #[test]
    fn repeated_merges_do_not_drift() {
        let mut stats = TermStatistics::from_doc_freqs(7, &[3, 7, 1]);
        let mut truth = vec![3u64, 7, 1];
        let mut n = 7;
        for _ in 0..200 {
            let batch = TermStatistics::from_doc_freqs(5, &[2, 5, 0]);
            stats = stats.merge(&batch, &[0, 1, 2], 3);
            truth[0] += 2;
            truth[1] += 5;
            n += 5;
        }
        assert_eq!(stats.doc_num, n);
        assert_eq!(stats.doc_freqs(), truth);
    }
}
