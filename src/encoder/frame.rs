use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EncoderError, Result};

/// A batch of named text columns. Cells may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFrame {
    columns: IndexMap<String, Vec<Option<String>>>,
}

impl TextFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-column frame from plain strings
    pub fn from_texts<I, S>(name: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_column(name, texts.into_iter().map(|t| Some(t.into())).collect())
    }

    /// Add or replace a column
    pub fn with_column(mut self, name: &str, cells: Vec<Option<String>>) -> Self {
        self.columns.insert(name.to_string(), cells);
        self
    }

    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row count shared by every column
    pub fn n_rows(&self) -> Result<usize> {
        let mut lens = self.columns.iter().map(|(name, cells)| (name, cells.len()));
        let Some((_, n)) = lens.next() else {
            return Err(EncoderError::MalformedInput("batch has no columns".to_string()));
        };
        if let Some((name, len)) = lens.find(|&(_, len)| len != n) {
            return Err(EncoderError::MalformedInput(format!(
                "column {name} has {len} rows, expected {n}"
            )));
        }
        Ok(n)
    }
}

/// Encoded rows: `rows.len()` documents by `feature_names.len()` values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodedMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl EncodedMatrix {
    /// Concatenate per-column embeddings side by side
    pub(crate) fn from_columns(n_rows: usize, k: usize, columns: Vec<(&str, Vec<Vec<f64>>)>) -> Self {
        let mut feature_names = Vec::with_capacity(columns.len() * k);
        let mut rows = vec![Vec::with_capacity(columns.len() * k); n_rows];
        for (name, encoded) in columns {
            feature_names.extend((0..k).map(|i| format!("{name}_svd{i}")));
            for (row, values) in rows.iter_mut().zip(encoded) {
                row.extend(values);
            }
        }
        Self { feature_names, rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }
}
