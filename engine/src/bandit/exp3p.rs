//! Exp3p: Exp3 with exploration tuned to each node's estimated iteration
//! budget, mixing in the model's policy prior instead of a uniform floor.
//!
//! Constants follow Bubeck and Cesa-Bianchi (arXiv:1204.5721), Theorem 3.3:
//! `eta = 0.95 * sqrt(ln k / (t k))`, `gamma = min(1, 1.05 * sqrt(k ln k / t))`
//! and a gain bonus `beta = sqrt(ln k / (t k))`, where `t` is the budget.

use super::exp3::visit_distribution;
use super::{add_gain, mixed_forecast, BanditAlgorithm, ChanceTotals, Outcome, Reach};
use crate::game::{ModelOutput, Value};
use crate::math::sample_pdf;
use rand::Rng;

#[derive(Debug, Clone, Copy, Default)]
pub struct Exp3p;

#[derive(Debug, Clone)]
pub struct Exp3pStats {
    /// Estimated number of playouts this node will receive.
    pub budget: usize,
    pub row_gains: Vec<f64>,
    pub col_gains: Vec<f64>,
    pub row_visits: Vec<u64>,
    pub col_visits: Vec<u64>,
    /// Model priors from expansion.
    pub row_policy: Vec<f64>,
    pub col_policy: Vec<f64>,
    pub visits: u64,
    pub value_total: Value,
}

impl Default for Exp3pStats {
    fn default() -> Self {
        Exp3pStats {
            budget: 1,
            row_gains: Vec::new(),
            col_gains: Vec::new(),
            row_visits: Vec::new(),
            col_visits: Vec::new(),
            row_policy: Vec::new(),
            col_policy: Vec::new(),
            visits: 0,
            value_total: Value::default(),
        }
    }
}

impl Exp3p {
    pub fn new() -> Self {
        Exp3p
    }

    fn forecast(gains: &[f64], prior: &[f64], budget: usize) -> Vec<f64> {
        let k = gains.len() as f64;
        let t = budget.max(1) as f64;
        let eta = 0.95 * (k.ln() / (t * k)).sqrt();
        let gamma = (1.05 * (k * k.ln() / t).sqrt()).min(1.0);
        mixed_forecast(gains, eta, gamma, prior)
    }

    fn beta(k: usize, budget: usize) -> f64 {
        let k = k as f64;
        (k.ln() / (budget.max(1) as f64 * k)).sqrt()
    }
}

/// Normalized copy of a prior, uniform if it is missing or empty of mass.
fn prior(policy: &[f64], n: usize) -> Vec<f64> {
    let sum: f64 = policy.iter().sum();
    if policy.len() != n || sum <= 0.0 {
        return vec![1.0 / n as f64; n];
    }
    policy.iter().map(|&p| p / sum).collect()
}

impl BanditAlgorithm for Exp3p {
    type MatrixStats = Exp3pStats;
    type ChanceStats = ChanceTotals;

    fn initialize_stats(&self, iterations: usize, stats: &mut Exp3pStats) {
        stats.budget = iterations.max(1);
    }

    fn expand(
        &self,
        stats: &mut Exp3pStats,
        rows: usize,
        cols: usize,
        output: &ModelOutput,
        reach: Option<Reach>,
    ) {
        stats.row_gains = vec![0.0; rows];
        stats.col_gains = vec![0.0; cols];
        stats.row_visits = vec![0; rows];
        stats.col_visits = vec![0; cols];
        stats.row_policy = prior(&output.row_policy, rows);
        stats.col_policy = prior(&output.col_policy, cols);
        if let Some(reach) = reach {
            stats.budget = reach.budget();
        }
    }

    fn select<R: Rng + ?Sized>(&self, rng: &mut R, stats: &mut Exp3pStats, outcome: &mut Outcome) {
        let row_forecast = Self::forecast(&stats.row_gains, &stats.row_policy, stats.budget);
        let col_forecast = Self::forecast(&stats.col_gains, &stats.col_policy, stats.budget);
        outcome.row_idx = sample_pdf(rng, &row_forecast);
        outcome.col_idx = sample_pdf(rng, &col_forecast);
        outcome.row_mu = row_forecast[outcome.row_idx];
        outcome.col_mu = col_forecast[outcome.col_idx];
    }

    fn reach(&self, stats: &Exp3pStats, outcome: &Outcome) -> Reach {
        Reach {
            parent_budget: stats.budget,
            probability: stats.row_policy[outcome.row_idx] * stats.col_policy[outcome.col_idx],
        }
    }

    fn update_matrix_stats(&self, stats: &mut Exp3pStats, outcome: &Outcome) {
        stats.visits += 1;
        stats.value_total += outcome.value;
        stats.row_visits[outcome.row_idx] += 1;
        stats.col_visits[outcome.col_idx] += 1;
        let row_beta = Self::beta(stats.row_gains.len(), stats.budget);
        let col_beta = Self::beta(stats.col_gains.len(), stats.budget);
        add_gain(
            &mut stats.row_gains,
            outcome.row_idx,
            outcome.value.row / outcome.row_mu + row_beta,
        );
        add_gain(
            &mut stats.col_gains,
            outcome.col_idx,
            outcome.value.col / outcome.col_mu + col_beta,
        );
    }

    fn update_chance_stats(&self, stats: &mut ChanceTotals, outcome: &Outcome) {
        stats.record(outcome.value);
    }

    fn empirical_strategies(&self, stats: &Exp3pStats) -> (Vec<f64>, Vec<f64>) {
        (visit_distribution(&stats.row_visits), visit_distribution(&stats.col_visits))
    }

    fn empirical_value(&self, stats: &Exp3pStats) -> Value {
        stats.value_total.scale(1.0 / stats.visits.max(1) as f64)
    }

    fn visits(&self, stats: &Exp3pStats) -> u64 {
        stats.visits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_initialize_records_budget() {
        let mut stats = Exp3pStats::default();
        Exp3p.initialize_stats(10_000, &mut stats);
        let output = ModelOutput::uniform(Value::default(), 2, 2);
        Exp3p.expand(&mut stats, 2, 2, &output, None);
        assert_eq!(stats.budget, 10_000);
    }

    #[test]
    fn test_child_budget_from_reach() {
        let mut parent = Exp3pStats::default();
        Exp3p.initialize_stats(1_000, &mut parent);
        let output = ModelOutput {
            value: Value::default(),
            row_policy: vec![0.2, 0.8],
            col_policy: vec![0.5, 0.5],
        };
        Exp3p.expand(&mut parent, 2, 2, &output, None);
        let outcome = Outcome { row_idx: 1, col_idx: 0, ..Outcome::default() };
        let reach = Exp3p.reach(&parent, &outcome).through(0.5);
        assert!((reach.probability - 0.2).abs() < 1e-10);

        let mut child = Exp3pStats::default();
        Exp3p.expand(&mut child, 3, 3, &ModelOutput::uniform(Value::default(), 3, 3), Some(reach));
        assert_eq!(child.budget, 200);

        let mut unlikely = Exp3pStats::default();
        let reach = Reach { parent_budget: 3, probability: 0.1 };
        Exp3p.expand(&mut unlikely, 2, 2, &ModelOutput::uniform(Value::default(), 2, 2), Some(reach));
        assert_eq!(unlikely.budget, 1);
    }

    #[test]
    fn test_small_budget_follows_prior() {
        // gamma saturates at 1 for tiny budgets, leaving only the prior.
        let forecast = Exp3p::forecast(&[-5.0, 0.0], &[0.9, 0.1], 1);
        assert!((forecast[0] - 0.9).abs() < 1e-10);
        assert!((forecast[1] - 0.1).abs() < 1e-10);
    }

    #[test]
    fn test_bad_prior_falls_back_to_uniform() {
        assert_eq!(prior(&[], 2), vec![0.5, 0.5]);
        assert_eq!(prior(&[0.0, 0.0], 2), vec![0.5, 0.5]);
        assert_eq!(prior(&[2.0, 6.0], 2), vec![0.25, 0.75]);
    }

    #[test]
    fn test_select_and_update() {
        let mut stats = Exp3pStats::default();
        Exp3p.initialize_stats(100, &mut stats);
        Exp3p.expand(&mut stats, 2, 3, &ModelOutput::uniform(Value::default(), 2, 3), None);
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let mut outcome = Outcome::default();
        Exp3p.select(&mut rng, &mut stats, &mut outcome);
        assert!(outcome.row_mu > 0.0 && outcome.row_mu <= 1.0);
        assert!(outcome.col_idx < 3);
        outcome.value = Value::constant_sum(1.0);
        Exp3p.update_matrix_stats(&mut stats, &outcome);
        assert_eq!(Exp3p.visits(&stats), 1);
        assert_eq!(stats.row_visits.iter().sum::<u64>(), 1);
        let (row, col) = Exp3p.empirical_strategies(&stats);
        assert!((row[outcome.row_idx] - 1.0).abs() < 1e-10);
        assert!((col.iter().sum::<f64>() - 1.0).abs() < 1e-10);
    }
}
