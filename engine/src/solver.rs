//! Bimatrix solvers used by MatrixUCB.
//!
//! The search treats the solver as an injected collaborator: anything that
//! maps a pair of payoff matrices to a strategy profile will do. The built-in
//! [`RegretMatchingSolver`] runs regret-matching+ self-play and returns the
//! linearly weighted average strategies.

use crate::math::Matrix;

/// Computes an (approximate) equilibrium of a bimatrix game.
pub trait Solver: Send + Sync {
    /// Returns `(row_strategy, col_strategy)` for payoffs `row` (row player)
    /// and `col` (column player), both `rows x cols`.
    fn solve_bimatrix(&self, row: &Matrix, col: &Matrix) -> (Vec<f64>, Vec<f64>);
}

/// Regret-matching+ self-play over a fixed number of iterations.
#[derive(Debug, Clone, Copy)]
pub struct RegretMatchingSolver {
    pub iterations: usize,
}

impl RegretMatchingSolver {
    pub fn new(iterations: usize) -> Self {
        RegretMatchingSolver { iterations: iterations.max(1) }
    }
}

impl Default for RegretMatchingSolver {
    fn default() -> Self {
        RegretMatchingSolver { iterations: 1_000 }
    }
}

/// Cumulative regrets and strategy sums for one player.
struct RegretTable {
    /// Cumulative regrets, floored at 0 after every update.
    regrets: Vec<f64>,
    /// Linearly weighted strategy accumulation.
    strategy_sums: Vec<f64>,
}

impl RegretTable {
    fn new(actions: usize) -> Self {
        RegretTable {
            regrets: vec![0.0; actions],
            strategy_sums: vec![0.0; actions],
        }
    }

    /// σ(a) = r+(a) / Σr+(a); uniform if all regrets are zero.
    fn current_strategy(&self) -> Vec<f64> {
        let pos_sum: f64 = self.regrets.iter().map(|&x| x.max(0.0)).sum();
        if pos_sum <= 0.0 {
            let n = self.regrets.len();
            return vec![1.0 / n as f64; n];
        }
        self.regrets.iter().map(|&x| x.max(0.0) / pos_sum).collect()
    }

    /// r(a) = max(0, r(a) + u(a) - Σσ(b)u(b)).
    fn update_regrets(&mut self, strategy: &[f64], action_values: &[f64]) {
        let value: f64 = strategy.iter().zip(action_values).map(|(p, u)| p * u).sum();
        for (r, &u) in self.regrets.iter_mut().zip(action_values) {
            *r = (*r + u - value).max(0.0);
        }
    }

    fn accumulate_strategy(&mut self, strategy: &[f64], iteration: usize) {
        let weight = iteration as f64;
        for (s, &p) in self.strategy_sums.iter_mut().zip(strategy) {
            *s += weight * p;
        }
    }

    fn average_strategy(&self) -> Vec<f64> {
        let total: f64 = self.strategy_sums.iter().sum();
        if total <= 0.0 {
            let n = self.strategy_sums.len();
            return vec![1.0 / n as f64; n];
        }
        self.strategy_sums.iter().map(|&x| x / total).collect()
    }
}

impl Solver for RegretMatchingSolver {
    fn solve_bimatrix(&self, row: &Matrix, col: &Matrix) -> (Vec<f64>, Vec<f64>) {
        let rows = row.rows();
        let cols = row.cols();
        assert!(
            col.rows() == rows && col.cols() == cols,
            "payoff matrices must have the same shape"
        );
        let mut row_table = RegretTable::new(rows);
        let mut col_table = RegretTable::new(cols);

        for t in 1..=self.iterations {
            let row_strategy = row_table.current_strategy();
            let col_strategy = col_table.current_strategy();

            let mut row_values = vec![0.0; rows];
            let mut col_values = vec![0.0; cols];
            for row_idx in 0..rows {
                for col_idx in 0..cols {
                    row_values[row_idx] += col_strategy[col_idx] * row[(row_idx, col_idx)];
                    col_values[col_idx] += row_strategy[row_idx] * col[(row_idx, col_idx)];
                }
            }

            row_table.update_regrets(&row_strategy, &row_values);
            col_table.update_regrets(&col_strategy, &col_values);
            row_table.accumulate_strategy(&row_strategy, t);
            col_table.accumulate_strategy(&col_strategy, t);
        }

        (row_table.average_strategy(), col_table.average_strategy())
    }
}
