//! Numeric helpers shared by the bandit algorithms and the bimatrix solver.
//!
//! Strategies are plain `Vec<f64>` distributions. Matrices are dense and
//! row-major, indexed by `(row_idx, col_idx)`.

use rand::Rng;
use std::ops::{Index, IndexMut};

/// Dense row-major matrix of reals.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Zero-filled `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Build a matrix entry by entry.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for row_idx in 0..rows {
            for col_idx in 0..cols {
                data.push(f(row_idx, col_idx));
            }
        }
        Matrix { rows, cols, data }
    }

    /// Build a matrix from equally sized rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|row| row.len() == cols),
            "matrix rows must all have {} entries",
            cols
        );
        Matrix {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Apply `f` to every entry.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row_idx, col_idx): (usize, usize)) -> &f64 {
        assert!(row_idx < self.rows && col_idx < self.cols, "matrix index out of bounds");
        &self.data[row_idx * self.cols + col_idx]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row_idx, col_idx): (usize, usize)) -> &mut f64 {
        assert!(row_idx < self.rows && col_idx < self.cols, "matrix index out of bounds");
        &mut self.data[row_idx * self.cols + col_idx]
    }
}

/// Raise every entry to `power` and normalize to a distribution.
///
/// An all-zero input (e.g. a node that has never been visited) yields the
/// uniform distribution, so the result always sums to 1 for non-empty input.
pub fn power_norm(input: &[f64], power: f64) -> Vec<f64> {
    let powered: Vec<f64> = input.iter().map(|&x| x.powf(power)).collect();
    let sum: f64 = powered.iter().sum();
    if sum <= 0.0 {
        let n = input.len();
        return vec![1.0 / n as f64; n];
    }
    powered.iter().map(|&x| x / sum).collect()
}

/// Softmax of `gains` scaled by `eta`.
///
/// Gains are shifted by their maximum (floored at 0) before exponentiating.
pub fn softmax(gains: &[f64], eta: f64) -> Vec<f64> {
    let max = gains.iter().copied().fold(0.0_f64, f64::max);
    let exps: Vec<f64> = gains.iter().map(|&g| ((g - max) * eta).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&y| y / sum).collect()
}

/// Sample an index from an (unnormalized) probability vector.
pub fn sample_pdf<R: Rng + ?Sized>(rng: &mut R, pdf: &[f64]) -> usize {
    assert!(!pdf.is_empty(), "cannot sample from an empty distribution");
    let total: f64 = pdf.iter().sum();
    let mut target = rng.gen::<f64>() * total;
    let mut last_positive = 0;
    for (idx, &p) in pdf.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        if target < p {
            return idx;
        }
        target -= p;
        last_positive = idx;
    }
    // Rounding can leave a sliver of mass past the final bucket.
    last_positive
}

/// Expected payoffs `(row, col)` of a strategy profile on a bimatrix.
pub fn expected_payoffs(
    row_payoffs: &Matrix,
    col_payoffs: &Matrix,
    row_strategy: &[f64],
    col_strategy: &[f64],
) -> (f64, f64) {
    let mut row_value = 0.0;
    let mut col_value = 0.0;
    for (row_idx, &p) in row_strategy.iter().enumerate() {
        for (col_idx, &q) in col_strategy.iter().enumerate() {
            row_value += p * q * row_payoffs[(row_idx, col_idx)];
            col_value += p * q * col_payoffs[(row_idx, col_idx)];
        }
    }
    (row_value, col_value)
}

/// Sum over both players of the best-response gain against a strategy profile.
///
/// Zero exactly at a Nash equilibrium of the bimatrix.
pub fn exploitability(
    row_payoffs: &Matrix,
    col_payoffs: &Matrix,
    row_strategy: &[f64],
    col_strategy: &[f64],
) -> f64 {
    let rows = row_payoffs.rows();
    let cols = row_payoffs.cols();
    let mut row_response = vec![0.0; rows];
    let mut col_response = vec![0.0; cols];
    for row_idx in 0..rows {
        for col_idx in 0..cols {
            row_response[row_idx] += col_strategy[col_idx] * row_payoffs[(row_idx, col_idx)];
            col_response[col_idx] += row_strategy[row_idx] * col_payoffs[(row_idx, col_idx)];
        }
    }
    let (row_value, col_value) =
        expected_payoffs(row_payoffs, col_payoffs, row_strategy, col_strategy);
    let row_best = row_response.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let col_best = col_response.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (row_best - row_value) + (col_best - col_value)
}
