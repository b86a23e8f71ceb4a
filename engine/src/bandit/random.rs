//! Uniform random selection. A baseline for timing states and the tree
//! itself, with no learning cost at the nodes.

use super::exp3::visit_distribution;
use super::{BanditAlgorithm, ChanceTotals, Outcome, Reach};
use crate::game::{ModelOutput, Value};
use rand::Rng;

#[derive(Debug, Clone, Copy, Default)]
pub struct Random;

#[derive(Debug, Clone, Default)]
pub struct RandomStats {
    pub row_visits: Vec<u64>,
    pub col_visits: Vec<u64>,
    pub visits: u64,
    pub value_total: Value,
}

impl Random {
    pub fn new() -> Self {
        Random
    }
}

impl BanditAlgorithm for Random {
    type MatrixStats = RandomStats;
    type ChanceStats = ChanceTotals;

    fn expand(&self, stats: &mut RandomStats, rows: usize, cols: usize, _output: &ModelOutput, _reach: Option<Reach>) {
        stats.row_visits = vec![0; rows];
        stats.col_visits = vec![0; cols];
    }

    fn select<R: Rng + ?Sized>(&self, rng: &mut R, stats: &mut RandomStats, outcome: &mut Outcome) {
        let rows = stats.row_visits.len();
        let cols = stats.col_visits.len();
        outcome.row_idx = rng.gen_range(0..rows);
        outcome.col_idx = rng.gen_range(0..cols);
        outcome.row_mu = 1.0 / rows as f64;
        outcome.col_mu = 1.0 / cols as f64;
    }

    fn update_matrix_stats(&self, stats: &mut RandomStats, outcome: &Outcome) {
        stats.visits += 1;
        stats.value_total += outcome.value;
        stats.row_visits[outcome.row_idx] += 1;
        stats.col_visits[outcome.col_idx] += 1;
    }

    fn update_chance_stats(&self, stats: &mut ChanceTotals, outcome: &Outcome) {
        stats.record(outcome.value);
    }

    fn empirical_strategies(&self, stats: &RandomStats) -> (Vec<f64>, Vec<f64>) {
        (visit_distribution(&stats.row_visits), visit_distribution(&stats.col_visits))
    }

    fn empirical_value(&self, stats: &RandomStats) -> Value {
        stats.value_total.scale(1.0 / stats.visits.max(1) as f64)
    }

    fn visits(&self, stats: &RandomStats) -> u64 {
        stats.visits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_uniform_selection() {
        let bandit = Random::new();
        let mut stats = RandomStats::default();
        let output = ModelOutput::uniform(Value::default(), 4, 2);
        bandit.expand(&mut stats, 4, 2, &output, None);

        let mut rng = ChaCha20Rng::seed_from_u64(8);
        for _ in 0..8_000 {
            let mut outcome = Outcome::default();
            bandit.select(&mut rng, &mut stats, &mut outcome);
            assert!((outcome.row_mu - 0.25).abs() < 1e-10);
            assert!((outcome.col_mu - 0.5).abs() < 1e-10);
            outcome.value = Value::constant_sum(0.5);
            bandit.update_matrix_stats(&mut stats, &outcome);
        }
        let (row, col) = bandit.empirical_strategies(&stats);
        for p in row {
            assert!((p - 0.25).abs() < 0.03);
        }
        for p in col {
            assert!((p - 0.5).abs() < 0.03);
        }
        assert_eq!(bandit.visits(&stats), 8_000);
        assert!((bandit.empirical_value(&stats).row - 0.5).abs() < 1e-10);
    }
}
