//! Hand-off of fitted columns to an external scoring service.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::projection::ProjectionBasis;
use crate::vectorizer::{idf::TermStatistics, vocabulary::Vocabulary};

/// Identifies the model group a set of columns belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactGroup {
    pub uuid: Option<String>,
    pub name: Option<String>,
}

/// Receives one fitted column at a time.
pub trait ScoringArtifactSink {
    fn write_column(
        &mut self,
        group: &ArtifactGroup,
        column: &str,
        vocabulary: &Vocabulary,
        stats: &TermStatistics,
        basis: &ProjectionBasis,
    ) -> Result<()>;
}

/// Everything a scorer needs to encode one column without this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnArtifact {
    pub group_uuid: Option<String>,
    pub group_name: Option<String>,
    pub column: String,
    pub terms: Vec<String>,
    pub idf: Vec<f64>,
    pub doc_num: u64,
    /// `k` rows of `terms.len()` values
    pub components: Vec<Vec<f64>>,
}

/// Collects columns and writes them as one JSON array on `finish`.
#[derive(Debug)]
pub struct JsonArtifactSink<W: Write> {
    writer: W,
    artifacts: Vec<ColumnArtifact>,
}

impl<W: Write> JsonArtifactSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            artifacts: Vec::new(),
        }
    }

    pub fn artifacts(&self) -> &[ColumnArtifact] {
        &self.artifacts
    }

    pub fn finish(mut self) -> Result<W> {
        serde_json::to_writer(&mut self.writer, &self.artifacts)?;
        tracing::info!(columns = self.artifacts.len(), "scoring artifacts written");
        Ok(self.writer)
    }
}

impl<W: Write> ScoringArtifactSink for JsonArtifactSink<W> {
    fn write_column(
        &mut self,
        group: &ArtifactGroup,
        column: &str,
        vocabulary: &Vocabulary,
        stats: &TermStatistics,
        basis: &ProjectionBasis,
    ) -> Result<()> {
        let components = basis.components();
        self.artifacts.push(ColumnArtifact {
            group_uuid: group.uuid.clone(),
            group_name: group.name.clone(),
            column: column.to_string(),
            terms: vocabulary.terms().map(str::to_string).collect(),
            idf: stats.idf.clone(),
            doc_num: stats.doc_num,
            components: (0..components.rows()).map(|r| components.row(r).to_vec()).collect(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderParams, PersistencePaths};
    use crate::encoder::{frame::TextFrame, ContinuousTextEncoder};

    #[test]
    fn exported_columns_match_the_state() {
        let params = EncoderParams {
            reduced_dimension: 2,
            ..EncoderParams::default()
        };
        let mut encoder = ContinuousTextEncoder::new(params, PersistencePaths::default()).unwrap();
        let batch = TextFrame::from_texts("title", ["red apple", "green apple", "red car"])
            .with_column("body", vec![Some("fresh fruit".into()), None, Some("fast engine".into())]);
        encoder.fit(&batch, None).unwrap();

        let group = ArtifactGroup {
            uuid: Some("g-1".into()),
            name: Some("products".into()),
        };
        let mut sink = JsonArtifactSink::new(Vec::new());
        encoder.export(&mut sink, &group).unwrap();
        assert_eq!(sink.artifacts().len(), 2);
        assert_eq!(sink.artifacts()[0].column, "title");
        assert_eq!(sink.artifacts()[0].terms, vec!["red", "apple", "green", "car"]);
        assert_eq!(sink.artifacts()[1].components.len(), 2);

        let bytes = sink.finish().unwrap();
        let parsed: Vec<ColumnArtifact> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed[0].group_uuid.as_deref(), Some("g-1"));
        assert_eq!(parsed[1].terms.len(), parsed[1].idf.len());
    }

    #[test]
    fn export_requires_a_fitted_encoder() {
        let encoder = ContinuousTextEncoder::new(EncoderParams::default(), PersistencePaths::default()).unwrap();
        let mut sink = JsonArtifactSink::new(Vec::new());
        assert!(encoder.export(&mut sink, &ArtifactGroup::default()).is_err());
    }
}
