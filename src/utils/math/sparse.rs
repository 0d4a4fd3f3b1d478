use num::Num;
use serde::{Deserialize, Serialize};

use crate::error::DecomposeError;

/// SparseRow keeps only the non-zero entries of a row.
/// `indices` are strictly ascending and every index is `< len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseRow<N = f64>
where
    N: Num + Copy,
{
    indices: Vec<usize>,
    values: Vec<N>,
    len: usize,
}

impl<N> SparseRow<N>
where
    N: Num + Copy,
{
    pub fn zeros(len: usize) -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
            len,
        }
    }

    /// Build from `(index, value)` pairs in any order.
    /// Duplicate indices are summed, zero values dropped.
    pub fn from_pairs(len: usize, mut pairs: Vec<(usize, N)>) -> Result<Self, DecomposeError> {
        pairs.sort_unstable_by_key(|&(idx, _)| idx);
        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<N> = Vec::with_capacity(pairs.len());
        for (idx, val) in pairs {
            if idx >= len {
                return Err(DecomposeError::DimensionMismatch { expected: len, got: idx + 1 });
            }
            if indices.last() == Some(&idx) {
                if let Some(acc) = values.last_mut() {
                    *acc = *acc + val;
                }
                continue;
            }
            indices.push(idx);
            values.push(val);
        }
        let mut row = Self { indices, values, len };
        row.prune_zeros();
        Ok(row)
    }

    fn prune_zeros(&mut self) {
        let zero = N::zero();
        let mut keep = 0;
        for i in 0..self.indices.len() {
            if self.values[i] != zero {
                self.indices[keep] = self.indices[i];
                self.values[keep] = self.values[i];
                keep += 1;
            }
        }
        self.indices.truncate(keep);
        self.values.truncate(keep);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Grow the logical width; new positions read as zero.
    #[inline]
    pub fn add_dim(&mut self, dim: usize) {
        self.len += dim;
    }

    pub fn get(&self, index: usize) -> N {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => N::zero(),
        }
    }

    /// Iterate the non-zero `(index, value)` pairs in ascending index order
    pub fn raw_iter(&self) -> impl Iterator<Item = (usize, N)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn to_dense(&self) -> Vec<N> {
        let mut dense = vec![N::zero(); self.len];
        for (idx, val) in self.raw_iter() {
            dense[idx] = val;
        }
        dense
    }
}

impl<N> SparseRow<N>
where
    N: Num + Copy + Into<f64>,
{
    /// Dot product with a dense slice; entries past `dense.len()` count as zero
    #[inline]
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.raw_iter()
            .filter(|&(idx, _)| idx < dense.len())
            .map(|(idx, val)| val.into() * dense[idx])
            .sum()
    }

    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|&v| {
                let v: f64 = v.into();
                v * v
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// Row-major sparse matrix of every term-weighted document seen so far.
/// The column count always equals the current vocabulary size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusMatrix {
    n_cols: usize,
    rows: Vec<SparseRow<f64>>,
}

impl CorpusMatrix {
    pub fn new(n_cols: usize) -> Self {
        Self { n_cols, rows: Vec::new() }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn rows(&self) -> &[SparseRow<f64>] {
        &self.rows
    }

    /// Widen to `n_cols` columns. Stored rows read zero in the new columns.
    pub fn widen(&mut self, n_cols: usize) {
        if n_cols <= self.n_cols {
            return;
        }
        let extra = n_cols - self.n_cols;
        for row in &mut self.rows {
            row.add_dim(extra);
        }
        self.n_cols = n_cols;
    }

    /// Append rows, which must already be as wide as the matrix.
    pub fn append_rows<I>(&mut self, rows: I) -> Result<(), DecomposeError>
    where
        I: IntoIterator<Item = SparseRow<f64>>,
    {
        let rows: Vec<SparseRow<f64>> = rows.into_iter().collect();
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_cols) {
            return Err(DecomposeError::DimensionMismatch { expected: self.n_cols, got: bad.len() });
        }
        self.rows.extend(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_sorts_sums_and_prunes() {
        let row = SparseRow::from_pairs(5, vec![(3, 1.0), (1, 2.0), (3, 1.5), (4, 0.0)]).unwrap();
        assert_eq!(row.nnz(), 2);
        assert_eq!(row.to_dense(), vec![0.0, 2.0, 0.0, 2.5, 0.0]);
        assert_eq!(row.get(3), 2.5);
        assert_eq!(row.get(0), 0.0);
    }

    #[test]
    fn from_pairs_rejects_out_of_range() {
        let err = SparseRow::from_pairs(2, vec![(2, 1.0)]).unwrap_err();
        assert_eq!(err, DecomposeError::DimensionMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn widen_backfills_zero_and_keeps_values() {
        let mut m = CorpusMatrix::new(2);
        m.append_rows(vec![SparseRow::from_pairs(2, vec![(0, 1.0), (1, 2.0)]).unwrap()]).unwrap();
        m.widen(4);
        assert_eq!(m.n_cols(), 4);
        assert_eq!(m.rows()[0].to_dense(), vec![1.0, 2.0, 0.0, 0.0]);

        m.append_rows(vec![SparseRow::from_pairs(4, vec![(3, 5.0)]).unwrap()]).unwrap();
        assert_eq!(m.n_rows(), 2);
        assert!(m.rows().iter().all(|r| r.len() == m.n_cols()));
    }

    #[test]
    fn append_rejects_narrow_rows() {
        let mut m = CorpusMatrix::new(3);
        assert!(m.append_rows(vec![SparseRow::zeros(2)]).is_err());
        assert_eq!(m.n_rows(), 0);
    }

    #[test]
    fn dot_and_norm() {
        let row = SparseRow::from_pairs(3, vec![(0, 3.0), (2, 4.0)]).unwrap();
        assert_eq!(row.norm(), 5.0);
        assert_eq!(row.dot_dense(&[1.0, 10.0, 0.5]), 5.0);
    }
}
