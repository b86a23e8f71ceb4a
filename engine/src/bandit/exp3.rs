//! Exp3: exponential weights with a uniform exploration floor.

use super::{add_gain, mixed_forecast, BanditAlgorithm, ChanceTotals, Outcome, Reach};
use crate::game::{ModelOutput, Value};
use crate::math::{power_norm, sample_pdf};
use rand::Rng;

/// Exp3 with a fixed exploration rate.
#[derive(Debug, Clone, Copy)]
pub struct Exp3 {
    gamma: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Exp3Stats {
    pub row_gains: Vec<f64>,
    pub col_gains: Vec<f64>,
    pub row_visits: Vec<u64>,
    pub col_visits: Vec<u64>,
    pub visits: u64,
    pub value_total: Value,
}

impl Exp3 {
    pub fn new(gamma: f64) -> Self {
        assert!((0.0..=1.0).contains(&gamma), "gamma must lie in [0, 1]");
        Exp3 { gamma }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    fn forecast(&self, gains: &[f64]) -> Vec<f64> {
        let k = gains.len();
        let uniform = vec![1.0 / k as f64; k];
        mixed_forecast(gains, self.gamma / k as f64, self.gamma, &uniform)
    }
}

impl Default for Exp3 {
    fn default() -> Self {
        Exp3 { gamma: 0.01 }
    }
}

impl BanditAlgorithm for Exp3 {
    type MatrixStats = Exp3Stats;
    type ChanceStats = ChanceTotals;

    fn expand(
        &self,
        stats: &mut Exp3Stats,
        rows: usize,
        cols: usize,
        _output: &ModelOutput,
        _reach: Option<Reach>,
    ) {
        stats.row_gains = vec![0.0; rows];
        stats.col_gains = vec![0.0; cols];
        stats.row_visits = vec![0; rows];
        stats.col_visits = vec![0; cols];
    }

    fn select<R: Rng + ?Sized>(&self, rng: &mut R, stats: &mut Exp3Stats, outcome: &mut Outcome) {
        let row_forecast = self.forecast(&stats.row_gains);
        let col_forecast = self.forecast(&stats.col_gains);
        outcome.row_idx = sample_pdf(rng, &row_forecast);
        outcome.col_idx = sample_pdf(rng, &col_forecast);
        outcome.row_mu = row_forecast[outcome.row_idx];
        outcome.col_mu = col_forecast[outcome.col_idx];
    }

    fn update_matrix_stats(&self, stats: &mut Exp3Stats, outcome: &Outcome) {
        stats.visits += 1;
        stats.value_total += outcome.value;
        stats.row_visits[outcome.row_idx] += 1;
        stats.col_visits[outcome.col_idx] += 1;
        add_gain(&mut stats.row_gains, outcome.row_idx, outcome.value.row / outcome.row_mu);
        add_gain(&mut stats.col_gains, outcome.col_idx, outcome.value.col / outcome.col_mu);
    }

    fn update_chance_stats(&self, stats: &mut ChanceTotals, outcome: &Outcome) {
        stats.record(outcome.value);
    }

    fn empirical_strategies(&self, stats: &Exp3Stats) -> (Vec<f64>, Vec<f64>) {
        (visit_distribution(&stats.row_visits), visit_distribution(&stats.col_visits))
    }

    fn empirical_value(&self, stats: &Exp3Stats) -> Value {
        stats.value_total.scale(1.0 / stats.visits.max(1) as f64)
    }

    fn visits(&self, stats: &Exp3Stats) -> u64 {
        stats.visits
    }
}

pub(super) fn visit_distribution(visits: &[u64]) -> Vec<f64> {
    let counts: Vec<f64> = visits.iter().map(|&n| n as f64).collect();
    power_norm(&counts, 1.0)
}
