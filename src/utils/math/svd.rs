//! Truncated SVD of a sparse row matrix by power iteration with deflation.
//!
//! Only the right singular vectors are kept; they are the projection
//! components. No centering is applied, so sparsity is preserved.

use rayon::prelude::*;

use super::dense::{dot, normalize, DenseMatrix, NEGLIGIBLE};
use super::sparse::SparseRow;

const MAX_ITER: usize = 300;
const CONVERGENCE_TOL: f64 = 1e-10;

/// Result of a truncated SVD: `A ≈ U * diag(S) * Vt`, without `U`.
#[derive(Debug, Clone)]
pub struct SvdResult {
    /// `rank x n_cols`, one right singular vector per row
    pub vt: DenseMatrix,
    pub s: Vec<f64>,
    pub rank: usize,
}

/// Top `max_rank` right singular vectors of the matrix whose rows are `rows`.
///
/// The rank actually found is at most `min(max_rank, rows, n_cols)` and stops
/// early once a singular value falls under `tolerance` times the Frobenius
/// norm. Results are deterministic: start vectors depend only on the data
/// and a fixed pattern, and each component is sign-flipped so its
/// largest-magnitude entry is positive.
pub fn svd_truncated(rows: &[SparseRow<f64>], n_cols: usize, max_rank: usize, tolerance: f64) -> SvdResult {
    let rank = max_rank.min(rows.len()).min(n_cols);
    let frobenius = rows.iter().map(|r| r.norm().powi(2)).sum::<f64>().sqrt();
    let abs_tol = (tolerance * frobenius).max(NEGLIGIBLE);

    let mut components: Vec<Vec<f64>> = Vec::with_capacity(rank);
    let mut s_vals = Vec::with_capacity(rank);

    for r in 0..rank {
        let Some(v) = power_iteration(rows, n_cols, &components, r) else {
            break;
        };
        let sigma = apply(rows, &v).iter().map(|x| x * x).sum::<f64>().sqrt();
        if sigma < abs_tol {
            break;
        }
        s_vals.push(sigma);
        components.push(v);
    }

    let found = components.len();
    let mut vt = DenseMatrix::zeros(found, n_cols);
    for (i, mut comp) in components.into_iter().enumerate() {
        flip_sign(&mut comp);
        vt.row_mut(i).copy_from_slice(&comp);
    }
    tracing::debug!(requested = max_rank, found, n_rows = rows.len(), n_cols, "truncated svd");
    SvdResult { vt, s: s_vals, rank: found }
}

/// Dominant eigenvector of `AᵀA` restricted to the complement of `previous`.
///
/// Starts are tried in order until one survives: the column sums blended with
/// a fixed pattern, the row with the largest residual, the least covered axis.
/// `None` means the data holds nothing outside `previous`.
fn power_iteration(rows: &[SparseRow<f64>], n_cols: usize, previous: &[Vec<f64>], seed: usize) -> Option<Vec<f64>> {
    let starts: [&dyn Fn() -> Option<Vec<f64>>; 3] = [
        &|| Some(column_sum_start(rows, n_cols, previous, seed)),
        &|| heaviest_residual_row(rows, n_cols, previous),
        &|| least_covered_axis(n_cols, previous),
    ];
    starts.iter().find_map(|start| {
        let mut v = start()?;
        deflate(&mut v, previous);
        if normalize(&mut v) <= NEGLIGIBLE {
            return None;
        }
        iterate(rows, n_cols, previous, v)
    })
}

/// Runs until the vector, not only its eigenvalue, stops moving.
fn iterate(rows: &[SparseRow<f64>], n_cols: usize, previous: &[Vec<f64>], mut v: Vec<f64>) -> Option<Vec<f64>> {
    for _ in 0..MAX_ITER {
        let u = apply(rows, &v);
        let mut w = apply_transpose(rows, &u, n_cols);
        deflate(&mut w, previous);
        if normalize(&mut w) <= NEGLIGIBLE {
            return None;
        }
        let shift = w.iter().zip(&v).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt();
        v = w;
        if shift < CONVERGENCE_TOL {
            break;
        }
    }
    Some(v)
}

/// `Aᵀ·1` plus half a fixed pattern, so the start sees the data and is not
/// orthogonal to a component by symmetry alone
fn column_sum_start(rows: &[SparseRow<f64>], n_cols: usize, previous: &[Vec<f64>], seed: usize) -> Vec<f64> {
    let mut sums = apply_transpose(rows, &vec![1.0; rows.len()], n_cols);
    deflate(&mut sums, previous);
    normalize(&mut sums);
    let mut pattern: Vec<f64> = (0..n_cols)
        .map(|i| ((i * 7 + seed * 5 + 3) % 13) as f64 / 13.0 - 0.5)
        .collect();
    deflate(&mut pattern, previous);
    normalize(&mut pattern);
    sums.iter().zip(&pattern).map(|(s, p)| s + 0.5 * p).collect()
}

fn heaviest_residual_row(rows: &[SparseRow<f64>], n_cols: usize, previous: &[Vec<f64>]) -> Option<Vec<f64>> {
    rows.iter()
        .map(|row| {
            let mut dense = vec![0.0; n_cols];
            for (idx, val) in row.raw_iter() {
                dense[idx] = val;
            }
            deflate(&mut dense, previous);
            dense
        })
        .max_by(|a, b| dot(a, a).total_cmp(&dot(b, b)))
}

fn least_covered_axis(n_cols: usize, previous: &[Vec<f64>]) -> Option<Vec<f64>> {
    let axis = (0..n_cols).min_by(|&a, &b| coverage(previous, a).total_cmp(&coverage(previous, b)))?;
    let mut v = vec![0.0; n_cols];
    v[axis] = 1.0;
    Some(v)
}

/// `A * v`
fn apply(rows: &[SparseRow<f64>], v: &[f64]) -> Vec<f64> {
    rows.par_iter().map(|row| row.dot_dense(v)).collect()
}

/// `Aᵀ * u`
fn apply_transpose(rows: &[SparseRow<f64>], u: &[f64], n_cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; n_cols];
    for (row, &weight) in rows.iter().zip(u) {
        for (idx, val) in row.raw_iter() {
            out[idx] += val * weight;
        }
    }
    out
}

fn deflate(v: &mut [f64], previous: &[Vec<f64>]) {
    for p in previous {
        let proj = dot(v, p);
        for (x, y) in v.iter_mut().zip(p) {
            *x -= proj * y;
        }
    }
}

fn coverage(previous: &[Vec<f64>], axis: usize) -> f64 {
    previous.iter().map(|p| p[axis] * p[axis]).sum()
}

fn flip_sign(v: &mut [f64]) {
    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}
