use serde::{Deserialize, Serialize};

use crate::utils::math::{
    dense::DenseMatrix,
    sparse::SparseRow,
    svd::{svd_truncated, SvdResult},
};

/// Singular values under this fraction of the Frobenius norm are dropped
pub const SVD_TOLERANCE: f64 = 1e-7;

/// How an update moves the projection basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptationPolicy {
    /// keep the whole corpus matrix and refit on it
    #[default]
    ExactRefit,
    /// fit on the new batch only and blend toward it with a bounded step
    IncrementalBlend,
}

/// Dense `k x V` matrix projecting a term-weighted document onto `k`
/// components. `k` is fixed at the first fit; only `V` grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionBasis {
    components: DenseMatrix,
}

impl ProjectionBasis {
    pub fn from_components(components: DenseMatrix) -> Self {
        Self { components }
    }

    /// Number of components, `k`
    #[inline]
    pub fn k(&self) -> usize {
        self.components.rows()
    }

    /// Number of vocabulary columns, `V`
    #[inline]
    pub fn n_terms(&self) -> usize {
        self.components.cols()
    }

    pub fn components(&self) -> &DenseMatrix {
        &self.components
    }

    /// Fit a basis of `k` rows on `rows`.
    ///
    /// When the data supports fewer than `k` components the remaining rows are
    /// taken from `prior` (zero-padded to `n_cols`), or left zero without one.
    pub fn refit(prior: Option<&ProjectionBasis>, rows: &[SparseRow<f64>], n_cols: usize, k: usize) -> Self {
        let fitted = svd_truncated(rows, n_cols, k, SVD_TOLERANCE);
        let mut components = match prior {
            Some(prior) if prior.k() == k => prior.components.widen(n_cols),
            _ => DenseMatrix::zeros(k, n_cols),
        };
        for r in 0..fitted.rank {
            components.row_mut(r).copy_from_slice(fitted.vt.row(r));
        }
        Self { components }
    }

    /// Nudge this basis toward one fit on the new batch alone.
    ///
    /// Shared columns move by `step` toward the batch basis:
    /// `old - step * (old - batch)`. Columns past the old width take the batch
    /// values directly. Rows the batch cannot support are kept as they were.
    pub fn blend(&self, batch_rows: &[SparseRow<f64>], n_cols: usize, step: f64) -> Self {
        let batch = svd_truncated(batch_rows, n_cols, self.k(), SVD_TOLERANCE);
        self.blend_with(&batch, step)
    }

    fn blend_with(&self, batch: &SvdResult, step: f64) -> Self {
        let n_cols = batch.vt.cols().max(self.n_terms());
        let shared = self.n_terms();
        let mut components = self.components.widen(n_cols);
        for r in 0..batch.rank.min(self.k()) {
            let target = batch.vt.row(r);
            let row = components.row_mut(r);
            for (j, x) in row.iter_mut().enumerate().take(target.len()) {
                if j < shared {
                    *x -= step * (*x - target[j]);
                } else {
                    *x = target[j];
                }
            }
        }
        Self { components }
    }

    /// Re-orthonormalize the component rows in place
    pub fn orthonormalize(&mut self) {
        self.components.orthonormalize_rows();
    }

    /// Project one term-weighted document. Columns past the basis width
    /// contribute nothing.
    pub fn project(&self, row: &SparseRow<f64>) -> Vec<f64> {
        (0..self.k())
            .map(|r| row.dot_dense(self.components.row(r)))
            .collect()
    }
}
