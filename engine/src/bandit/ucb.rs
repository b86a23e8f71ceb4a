//! Decoupled UCB1: each player runs its own UCB1 over its own actions,
//! ignoring the other player's choice.
//!
//! Selection is deterministic. Untried actions go first, in index order;
//! after that each player picks `argmax mean + c * sqrt(ln N / n)`, ties
//! going to the lowest index.

use super::exp3::visit_distribution;
use super::{BanditAlgorithm, ChanceTotals, Outcome, Reach};
use crate::game::{ModelOutput, Value};
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct Ucb {
    c: f64,
}

/// Visits and accumulated reward of one action.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmStats {
    pub visits: u64,
    pub total: f64,
}

impl ArmStats {
    pub fn mean(&self) -> f64 {
        self.total / self.visits.max(1) as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct UcbStats {
    pub row_arms: Vec<ArmStats>,
    pub col_arms: Vec<ArmStats>,
    pub visits: u64,
    pub value_total: Value,
}

impl Ucb {
    pub fn new(c: f64) -> Self {
        assert!(c >= 0.0, "exploration constant must be non-negative");
        Ucb { c }
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    fn choose(&self, arms: &[ArmStats], total_visits: u64) -> usize {
        if let Some(untried) = arms.iter().position(|arm| arm.visits == 0) {
            return untried;
        }
        let log_total = (total_visits.max(1) as f64).ln();
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (idx, arm) in arms.iter().enumerate() {
            let score = arm.mean() + self.c * (log_total / arm.visits as f64).sqrt();
            if score > best_score {
                best = idx;
                best_score = score;
            }
        }
        best
    }
}

impl Default for Ucb {
    fn default() -> Self {
        Ucb { c: 2.0 }
    }
}

fn arm_visits(arms: &[ArmStats]) -> Vec<u64> {
    arms.iter().map(|arm| arm.visits).collect()
}

impl BanditAlgorithm for Ucb {
    type MatrixStats = UcbStats;
    type ChanceStats = ChanceTotals;

    fn expand(&self, stats: &mut UcbStats, rows: usize, cols: usize, _output: &ModelOutput, _reach: Option<Reach>) {
        stats.row_arms = vec![ArmStats::default(); rows];
        stats.col_arms = vec![ArmStats::default(); cols];
    }

    fn select<R: Rng + ?Sized>(&self, _rng: &mut R, stats: &mut UcbStats, outcome: &mut Outcome) {
        outcome.row_idx = self.choose(&stats.row_arms, stats.visits);
        outcome.col_idx = self.choose(&stats.col_arms, stats.visits);
        outcome.row_mu = 1.0;
        outcome.col_mu = 1.0;
    }

    fn update_matrix_stats(&self, stats: &mut UcbStats, outcome: &Outcome) {
        stats.visits += 1;
        stats.value_total += outcome.value;
        let row = &mut stats.row_arms[outcome.row_idx];
        row.visits += 1;
        row.total += outcome.value.row;
        let col = &mut stats.col_arms[outcome.col_idx];
        col.visits += 1;
        col.total += outcome.value.col;
    }

    fn update_chance_stats(&self, stats: &mut ChanceTotals, outcome: &Outcome) {
        stats.record(outcome.value);
    }

    fn empirical_strategies(&self, stats: &UcbStats) -> (Vec<f64>, Vec<f64>) {
        (
            visit_distribution(&arm_visits(&stats.row_arms)),
            visit_distribution(&arm_visits(&stats.col_arms)),
        )
    }

    fn empirical_value(&self, stats: &UcbStats) -> Value {
        stats.value_total.scale(1.0 / stats.visits.max(1) as f64)
    }

    fn visits(&self, stats: &UcbStats) -> u64 {
        stats.visits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn expanded(rows: usize, cols: usize) -> UcbStats {
        let mut stats = UcbStats::default();
        let output = ModelOutput::uniform(Value::default(), rows, cols);
        Ucb::default().expand(&mut stats, rows, cols, &output, None);
        stats
    }

    #[test]
    fn test_default_exploration_constant() {
        assert!((Ucb::default().c() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_untried_actions_first() {
        let bandit = Ucb::default();
        let mut stats = expanded(3, 2);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let mut picks = Vec::new();
        for _ in 0..3 {
            let mut outcome = Outcome::default();
            bandit.select(&mut rng, &mut stats, &mut outcome);
            assert!((outcome.row_mu - 1.0).abs() < 1e-10);
            picks.push((outcome.row_idx, outcome.col_idx));
            outcome.value = Value::constant_sum(0.5);
            bandit.update_matrix_stats(&mut stats, &outcome);
        }
        assert_eq!(picks[0], (0, 0));
        assert_eq!(picks[1], (1, 1));
        assert_eq!(picks[2].0, 2);
        assert_eq!(bandit.visits(&stats), 3);
    }

    #[test]
    fn test_bonus_favors_rarely_tried_action() {
        let bandit = Ucb::default();
        let mut stats = expanded(2, 1);
        stats.row_arms[0] = ArmStats { visits: 50, total: 30.0 };
        stats.row_arms[1] = ArmStats { visits: 2, total: 0.8 };
        stats.visits = 52;
        assert_eq!(bandit.choose(&stats.row_arms, stats.visits), 1);

        let greedy = Ucb::new(0.0);
        assert_eq!(greedy.choose(&stats.row_arms, stats.visits), 0);
    }

    #[test]
    fn test_finds_dominant_actions() {
        let payoffs = [[0.6, 0.9], [0.1, 0.4]];
        let bandit = Ucb::default();
        let mut stats = expanded(2, 2);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        for _ in 0..2_000 {
            let mut outcome = Outcome::default();
            bandit.select(&mut rng, &mut stats, &mut outcome);
            outcome.value = Value::constant_sum(payoffs[outcome.row_idx][outcome.col_idx]);
            bandit.update_matrix_stats(&mut stats, &outcome);
        }
        let (row, col) = bandit.empirical_strategies(&stats);
        assert!(row[0] > 0.85);
        assert!(col[0] > 0.85);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        let value = bandit.empirical_value(&stats);
        assert!((value.row + value.col - 1.0).abs() < 1e-10);
    }
}
