//! The bandit algorithm contract and its implementations.
//!
//! A bandit algorithm owns the per-node statistics of the search and decides
//! which joint action to try next. The search calls it with the node's lock
//! held, so implementations see exclusive `&mut` access to their stats.

mod exp3;
mod exp3p;
mod matrix_ucb;
mod random;
mod ucb;

pub use exp3::{Exp3, Exp3Stats};
pub use exp3p::{Exp3p, Exp3pStats};
pub use matrix_ucb::{ConfidenceBound, MatrixUcb, MatrixUcbStats};
pub use random::{Random, RandomStats};
pub use ucb::{ArmStats, Ucb, UcbStats};

use crate::game::{ModelOutput, Value};
use rand::Rng;

/// The joint action chosen at a node during one playout, and what came back.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Outcome {
    pub row_idx: usize,
    pub col_idx: usize,
    /// Probability the row player's choice had when it was sampled.
    pub row_mu: f64,
    pub col_mu: f64,
    pub value: Value,
}

/// Reach information handed from a parent node to a newly expanded child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reach {
    /// The parent's iteration budget.
    pub parent_budget: usize,
    /// Probability of reaching the child from the parent.
    pub probability: f64,
}

impl Reach {
    /// Fold in the probability of the chance outcome that was observed.
    pub fn through(self, transition_probability: f64) -> Reach {
        Reach {
            probability: self.probability * transition_probability,
            ..self
        }
    }

    /// Estimated iteration budget of the child, truncated and floored at 1.
    pub fn budget(&self) -> usize {
        ((self.parent_budget as f64 * self.probability) as usize).max(1)
    }
}

/// Visit count and value total shared by every algorithm's chance stats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChanceTotals {
    pub visits: u64,
    pub value_total: Value,
}

impl ChanceTotals {
    pub fn record(&mut self, value: Value) {
        self.visits += 1;
        self.value_total += value;
    }

    /// Mean recorded value; zero before the first visit.
    pub fn mean(&self) -> Value {
        self.value_total.scale(1.0 / self.visits.max(1) as f64)
    }
}

/// Exploration and update policy driving the tree search.
///
/// Every method except `initialize_stats` is called with the owning matrix
/// node locked; `expand` runs exactly once per node, before any `select`.
pub trait BanditAlgorithm: Send + Sync {
    type MatrixStats: Default + Send;
    type ChanceStats: Default + Send;

    /// Seed the root's stats with the run's total iteration budget.
    fn initialize_stats(&self, _iterations: usize, _stats: &mut Self::MatrixStats) {}

    /// Size the stats for a `rows x cols` node. `reach` is `None` at the root.
    fn expand(
        &self,
        stats: &mut Self::MatrixStats,
        rows: usize,
        cols: usize,
        output: &ModelOutput,
        reach: Option<Reach>,
    );

    /// Choose a joint action, recording its indices and sampling mass.
    fn select<R: Rng + ?Sized>(&self, rng: &mut R, stats: &mut Self::MatrixStats, outcome: &mut Outcome);

    /// Reach information for the child behind `outcome`'s joint action.
    /// Algorithms without a time budget keep the default.
    fn reach(&self, _stats: &Self::MatrixStats, _outcome: &Outcome) -> Reach {
        Reach { parent_budget: 0, probability: 1.0 }
    }

    fn update_matrix_stats(&self, stats: &mut Self::MatrixStats, outcome: &Outcome);

    fn update_chance_stats(&self, stats: &mut Self::ChanceStats, outcome: &Outcome);

    /// Visit-count strategies, the answer of the search at this node.
    fn empirical_strategies(&self, stats: &Self::MatrixStats) -> (Vec<f64>, Vec<f64>);

    /// Visit-averaged value of this node.
    fn empirical_value(&self, stats: &Self::MatrixStats) -> Value;

    /// Number of completed updates at this node.
    fn visits(&self, stats: &Self::MatrixStats) -> u64;
}

/// Exploration-mixed forecast used by the Exp3 family: a single action gets
/// probability 1, otherwise `(1 - gamma) * softmax(gains, eta) + gamma * floor`.
pub(crate) fn mixed_forecast(gains: &[f64], eta: f64, gamma: f64, floor: &[f64]) -> Vec<f64> {
    if gains.len() == 1 {
        return vec![1.0];
    }
    crate::math::softmax(gains, eta)
        .into_iter()
        .zip(floor)
        .map(|(p, &f)| (1.0 - gamma) * p + gamma * f)
        .collect()
}

/// Add an importance-weighted reward to one gain, keeping every gain at or
/// below zero once the updated one turns non-negative.
pub(crate) fn add_gain(gains: &mut [f64], idx: usize, reward: f64) {
    gains[idx] += reward;
    let max = gains[idx];
    if max >= 0.0 {
        for gain in gains.iter_mut() {
            *gain -= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reach_budget_truncates_and_floors() {
        let reach = Reach { parent_budget: 1000, probability: 0.25 }.through(0.5);
        assert_eq!(reach.budget(), 125);
        let tiny = Reach { parent_budget: 10, probability: 0.01 };
        assert_eq!(tiny.budget(), 1);
        let fractional = Reach { parent_budget: 10, probability: 0.39 };
        assert_eq!(fractional.budget(), 3);
    }

    #[test]
    fn test_chance_totals_mean() {
        let mut totals = ChanceTotals::default();
        assert_eq!(totals.mean(), Value::default());
        totals.record(Value::new(1.0, 0.0));
        totals.record(Value::new(0.0, 1.0));
        assert_eq!(totals.visits, 2);
        assert!((totals.mean().row - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_mixed_forecast_single_action() {
        assert_eq!(mixed_forecast(&[42.0], 0.1, 0.5, &[1.0]), vec![1.0]);
    }

    #[test]
    fn test_mixed_forecast_floor() {
        let forecast = mixed_forecast(&[-1000.0, 0.0], 1.0, 0.1, &[0.5, 0.5]);
        assert!((forecast.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        assert!((forecast[0] - 0.05).abs() < 1e-10);
    }

    #[test]
    fn test_add_gain_shifts_to_nonpositive() {
        let mut gains = vec![-1.0, -2.0, -0.5];
        add_gain(&mut gains, 1, 3.0);
        assert!((gains[1]).abs() < 1e-10);
        assert!((gains[0] + 2.0).abs() < 1e-10);
        assert!((gains[2] + 1.5).abs() < 1e-10);
        add_gain(&mut gains, 0, 0.5);
        assert!((gains[0] + 1.5).abs() < 1e-10);
    }
}
