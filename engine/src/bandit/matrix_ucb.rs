//! MatrixUCB and MatrixPUCB.
//!
//! Each node keeps a value/visit table over joint actions. Selection builds
//! an optimistic bimatrix from that table and plays the cached strategy
//! profile, asking the solver for a new profile only when the cached one is
//! more than `expl_threshold` exploitable in the optimistic bimatrix.

use super::exp3::visit_distribution;
use super::{BanditAlgorithm, ChanceTotals, Outcome, Reach};
use crate::game::{ModelOutput, Value};
use crate::math::{exploitability, sample_pdf, Matrix};
use crate::solver::{RegretMatchingSolver, Solver};
use log::trace;
use rand::Rng;

/// Exploration bonus applied to every joint action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBound {
    /// `c * sqrt(ln N / n)`.
    Ucb,
    /// `c * p_row * p_col * sqrt(N) / (1 + n)`, weighted by the model priors.
    Pucb,
}

#[derive(Debug, Clone)]
pub struct MatrixUcb<V> {
    solver: V,
    c_uct: f64,
    expl_threshold: f64,
    bound: ConfidenceBound,
}

/// Accumulated value and visit count of one joint action.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cell {
    pub value: Value,
    pub visits: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MatrixUcbStats {
    pub rows: usize,
    pub cols: usize,
    pub total_visits: u64,
    /// Row-major `rows x cols` table.
    pub cells: Vec<Cell>,
    /// Cached strategy profile, reused until it becomes too exploitable.
    pub row_strategy: Vec<f64>,
    pub col_strategy: Vec<f64>,
    pub row_prior: Vec<f64>,
    pub col_prior: Vec<f64>,
    /// Number of times the solver was consulted at this node.
    pub recomputes: u64,
}

impl MatrixUcbStats {
    fn cell(&self, row_idx: usize, col_idx: usize) -> &Cell {
        &self.cells[row_idx * self.cols + col_idx]
    }
}

impl<V: Solver> MatrixUcb<V> {
    pub fn new(solver: V, c_uct: f64, expl_threshold: f64) -> Self {
        MatrixUcb { solver, c_uct, expl_threshold, bound: ConfidenceBound::Ucb }
    }

    pub fn pucb(solver: V, c_uct: f64, expl_threshold: f64) -> Self {
        MatrixUcb { solver, c_uct, expl_threshold, bound: ConfidenceBound::Pucb }
    }

    pub fn bound(&self) -> ConfidenceBound {
        self.bound
    }

    pub fn solver(&self) -> &V {
        &self.solver
    }

    fn exploration(&self, stats: &MatrixUcbStats, row_idx: usize, col_idx: usize) -> f64 {
        let n = stats.cell(row_idx, col_idx).visits;
        let total = stats.total_visits as f64;
        match self.bound {
            ConfidenceBound::Ucb => {
                let log_total = total.max(1.0).ln();
                self.c_uct * (log_total / n.max(1) as f64).sqrt()
            }
            ConfidenceBound::Pucb => {
                let prior = stats.row_prior[row_idx] * stats.col_prior[col_idx];
                self.c_uct * prior * total.sqrt() / (1 + n) as f64
            }
        }
    }

    /// Optimistic payoff matrices: mean value plus exploration bonus.
    pub fn bound_matrices(&self, stats: &MatrixUcbStats) -> (Matrix, Matrix) {
        let mut row = Matrix::new(stats.rows, stats.cols);
        let mut col = Matrix::new(stats.rows, stats.cols);
        for row_idx in 0..stats.rows {
            for col_idx in 0..stats.cols {
                let cell = stats.cell(row_idx, col_idx);
                let n = cell.visits.max(1) as f64;
                let eta = self.exploration(stats, row_idx, col_idx);
                row[(row_idx, col_idx)] = cell.value.row / n + eta;
                col[(row_idx, col_idx)] = cell.value.col / n + eta;
            }
        }
        (row, col)
    }

    /// Mean-value payoff matrices, no exploration bonus.
    pub fn value_matrices(&self, stats: &MatrixUcbStats) -> (Matrix, Matrix) {
        let mean = |row_idx: usize, col_idx: usize| {
            let cell = stats.cell(row_idx, col_idx);
            cell.value.scale(1.0 / cell.visits.max(1) as f64)
        };
        (
            Matrix::from_fn(stats.rows, stats.cols, |r, c| mean(r, c).row),
            Matrix::from_fn(stats.rows, stats.cols, |r, c| mean(r, c).col),
        )
    }

    /// Equilibrium of the mean-value bimatrix, an alternative to the
    /// visit-count strategies.
    pub fn refined_strategies(&self, stats: &MatrixUcbStats) -> (Vec<f64>, Vec<f64>) {
        let (row, col) = self.value_matrices(stats);
        self.solver.solve_bimatrix(&row, &col)
    }
}

impl<V: Solver + Default> Default for MatrixUcb<V> {
    fn default() -> Self {
        MatrixUcb::new(V::default(), 2.0, 0.005)
    }
}

impl MatrixUcb<RegretMatchingSolver> {
    /// PUCB with default constants and the built-in solver.
    pub fn default_pucb() -> Self {
        MatrixUcb::pucb(RegretMatchingSolver::default(), 2.0, 0.005)
    }
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}

impl<V: Solver> BanditAlgorithm for MatrixUcb<V> {
    type MatrixStats = MatrixUcbStats;
    type ChanceStats = ChanceTotals;

    fn expand(
        &self,
        stats: &mut MatrixUcbStats,
        rows: usize,
        cols: usize,
        output: &ModelOutput,
        _reach: Option<Reach>,
    ) {
        stats.rows = rows;
        stats.cols = cols;
        stats.cells = vec![Cell::default(); rows * cols];
        stats.row_strategy = uniform(rows);
        stats.col_strategy = uniform(cols);
        stats.row_prior = if output.row_policy.len() == rows {
            output.row_policy.clone()
        } else {
            uniform(rows)
        };
        stats.col_prior = if output.col_policy.len() == cols {
            output.col_policy.clone()
        } else {
            uniform(cols)
        };
    }

    fn select<R: Rng + ?Sized>(&self, rng: &mut R, stats: &mut MatrixUcbStats, outcome: &mut Outcome) {
        let (row, col) = self.bound_matrices(stats);
        let expl = exploitability(&row, &col, &stats.row_strategy, &stats.col_strategy);
        if expl > self.expl_threshold {
            let (row_strategy, col_strategy) = self.solver.solve_bimatrix(&row, &col);
            stats.row_strategy = row_strategy;
            stats.col_strategy = col_strategy;
            stats.recomputes += 1;
            trace!(
                "recomputed {}x{} strategy at {} visits (exploitability {:.4})",
                stats.rows,
                stats.cols,
                stats.total_visits,
                expl
            );
        }
        outcome.row_idx = sample_pdf(rng, &stats.row_strategy);
        outcome.col_idx = sample_pdf(rng, &stats.col_strategy);
        outcome.row_mu = stats.row_strategy[outcome.row_idx];
        outcome.col_mu = stats.col_strategy[outcome.col_idx];
    }

    fn update_matrix_stats(&self, stats: &mut MatrixUcbStats, outcome: &Outcome) {
        stats.total_visits += 1;
        let cols = stats.cols;
        let cell = &mut stats.cells[outcome.row_idx * cols + outcome.col_idx];
        cell.value += outcome.value;
        cell.visits += 1;
    }

    fn update_chance_stats(&self, stats: &mut ChanceTotals, outcome: &Outcome) {
        stats.record(outcome.value);
    }

    fn empirical_strategies(&self, stats: &MatrixUcbStats) -> (Vec<f64>, Vec<f64>) {
        let mut row_visits = vec![0; stats.rows];
        let mut col_visits = vec![0; stats.cols];
        for row_idx in 0..stats.rows {
            for col_idx in 0..stats.cols {
                let n = stats.cell(row_idx, col_idx).visits;
                row_visits[row_idx] += n;
                col_visits[col_idx] += n;
            }
        }
        (visit_distribution(&row_visits), visit_distribution(&col_visits))
    }

    fn empirical_value(&self, stats: &MatrixUcbStats) -> Value {
        let mut total = Value::default();
        for cell in &stats.cells {
            total += cell.value;
        }
        total.scale(1.0 / stats.total_visits.max(1) as f64)
    }

    fn visits(&self, stats: &MatrixUcbStats) -> u64 {
        stats.total_visits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Solver stub that counts calls and always returns a fixed profile.
    #[derive(Clone, Default)]
    struct FixedSolver {
        calls: Arc<AtomicUsize>,
    }

    impl Solver for FixedSolver {
        fn solve_bimatrix(&self, row: &Matrix, _col: &Matrix) -> (Vec<f64>, Vec<f64>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut r = vec![0.0; row.rows()];
            let mut c = vec![0.0; row.cols()];
            r[0] = 1.0;
            c[0] = 1.0;
            (r, c)
        }
    }

    fn expanded<V: Solver>(bandit: &MatrixUcb<V>, rows: usize, cols: usize) -> MatrixUcbStats {
        let mut stats = MatrixUcbStats::default();
        bandit.expand(&mut stats, rows, cols, &ModelOutput::uniform(Value::default(), rows, cols), None);
        stats
    }

    #[test]
    fn test_fresh_node_reuses_uniform_strategy() {
        let bandit = MatrixUcb::new(FixedSolver::default(), 2.0, 0.005);
        let mut stats = expanded(&bandit, 2, 2);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut outcome = Outcome::default();
        bandit.select(&mut rng, &mut stats, &mut outcome);
        // All bounds are equal, so uniform play is unexploitable.
        assert_eq!(bandit.solver().calls.load(Ordering::SeqCst), 0);
        assert!((outcome.row_mu - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_exploitable_strategy_triggers_solve() {
        let bandit = MatrixUcb::new(FixedSolver::default(), 2.0, 0.005);
        let mut stats = expanded(&bandit, 2, 2);
        let outcome = Outcome { row_idx: 0, col_idx: 0, row_mu: 0.5, col_mu: 0.5, value: Value::new(1.0, 1.0) };
        bandit.update_matrix_stats(&mut stats, &outcome);
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut selected = Outcome::default();
        bandit.select(&mut rng, &mut stats, &mut selected);
        assert_eq!(bandit.solver().calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.recomputes, 1);
        assert_eq!((selected.row_idx, selected.col_idx), (0, 0));
        assert!((selected.row_mu - 1.0).abs() < 1e-10);

        // The cached pure profile is an equilibrium of the unchanged bounds.
        bandit.select(&mut rng, &mut stats, &mut selected);
        assert_eq!(bandit.solver().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ucb_bonus_guards_zero_visits() {
        let bandit: MatrixUcb<RegretMatchingSolver> = MatrixUcb::default();
        let mut stats = expanded(&bandit, 2, 1);
        let (row, _) = bandit.bound_matrices(&stats);
        assert!(row[(0, 0)].is_finite());
        stats.total_visits = 100;
        stats.cells[0] = Cell { value: Value::new(50.0, 50.0), visits: 100 };
        let (row, col) = bandit.bound_matrices(&stats);
        let expected = 2.0 * (100f64.ln() / 100.0).sqrt();
        assert!((row[(0, 0)] - (0.5 + expected)).abs() < 1e-10);
        assert!((col[(1, 0)] - 2.0 * 100f64.ln().sqrt()).abs() < 1e-10);
    }

    #[test]
    fn test_pucb_bonus_uses_priors() {
        let bandit = MatrixUcb::pucb(FixedSolver::default(), 2.0, 0.005);
        let mut stats = MatrixUcbStats::default();
        let output = ModelOutput {
            value: Value::default(),
            row_policy: vec![0.75, 0.25],
            col_policy: vec![1.0],
        };
        bandit.expand(&mut stats, 2, 1, &output, None);
        stats.total_visits = 16;
        stats.cells[0].visits = 3;
        let (row, _) = bandit.bound_matrices(&stats);
        assert!((row[(0, 0)] - 2.0 * 0.75 * 4.0 / 4.0).abs() < 1e-10);
        assert!((row[(1, 0)] - 2.0 * 0.25 * 4.0).abs() < 1e-10);
        assert_eq!(bandit.bound(), ConfidenceBound::Pucb);
    }

    #[test]
    fn test_empirical_strategies_are_marginals() {
        let bandit: MatrixUcb<RegretMatchingSolver> = MatrixUcb::default();
        let mut stats = expanded(&bandit, 2, 3);
        for (row_idx, col_idx) in [(0, 0), (0, 1), (1, 1), (0, 2)] {
            let outcome = Outcome { row_idx, col_idx, row_mu: 1.0, col_mu: 1.0, value: Value::constant_sum(0.25) };
            bandit.update_matrix_stats(&mut stats, &outcome);
        }
        let (row, col) = bandit.empirical_strategies(&stats);
        assert!((row[0] - 0.75).abs() < 1e-10);
        assert!((col[1] - 0.5).abs() < 1e-10);
        assert!((bandit.empirical_value(&stats).col - 0.75).abs() < 1e-10);
        assert_eq!(bandit.visits(&stats), 4);
    }

    #[test]
    fn test_refined_strategies_solve_mean_values() {
        let bandit = MatrixUcb::new(RegretMatchingSolver::default(), 2.0, 0.005);
        let mut stats = expanded(&bandit, 2, 2);
        let payoffs = [[0.6, 0.9], [0.1, 0.4]];
        for row_idx in 0..2 {
            for col_idx in 0..2 {
                let outcome = Outcome {
                    row_idx,
                    col_idx,
                    row_mu: 1.0,
                    col_mu: 1.0,
                    value: Value::constant_sum(payoffs[row_idx][col_idx]),
                };
                bandit.update_matrix_stats(&mut stats, &outcome);
            }
        }
        let (row, col) = bandit.refined_strategies(&stats);
        assert!(row[0] > 0.99);
        assert!(col[0] > 0.99);
    }
}
