use serde::{Deserialize, Serialize};

use crate::error::DecomposeError;

/// A matrix stored in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl DenseMatrix {
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self, DecomposeError> {
        if data.len() != rows * cols {
            return Err(DecomposeError::InvalidShape {
                product: rows * cols,
                length: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Pad every row with zero columns up to `cols`.
    pub fn widen(&self, cols: usize) -> Self {
        if cols <= self.cols {
            return self.clone();
        }
        let mut out = Self::zeros(self.rows, cols);
        for r in 0..self.rows {
            out.row_mut(r)[..self.cols].copy_from_slice(self.row(r));
        }
        out
    }

    /// Modified Gram-Schmidt over the rows, in row order.
    /// Rows that are (numerically) dependent on earlier ones become zero.
    pub fn orthonormalize_rows(&mut self) {
        for r in 0..self.rows {
            for prev in 0..r {
                let (head, tail) = self.data.split_at_mut(r * self.cols);
                let prev_row = &head[prev * self.cols..(prev + 1) * self.cols];
                let row = &mut tail[..self.cols];
                let proj = dot(row, prev_row);
                for (x, p) in row.iter_mut().zip(prev_row) {
                    *x -= proj * p;
                }
            }
            let row = self.row_mut(r);
            if normalize(row) <= NEGLIGIBLE {
                row.iter_mut().for_each(|x| *x = 0.0);
            }
        }
    }
}

/// Norm under which a vector is treated as zero
pub const NEGLIGIBLE: f64 = 1e-12;

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Normalize a vector in place, returns the original norm.
pub fn normalize(v: &mut [f64]) -> f64 {
    let n = norm(v);
    if n > NEGLIGIBLE {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
    n
}
