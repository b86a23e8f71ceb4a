//! A constant-sum matrix played for several rounds with chance in between.
//!
//! After each round one of `branches` equally likely chance outcomes is
//! drawn from the state's own PRNG. Outcomes do not change the payoffs, but
//! they split the search tree, so the game exercises observation-keyed
//! chance children and per-playout reseeding.

use duet_engine::math::Matrix;
use duet_engine::{State, Transition, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RepeatedMatrixGame {
    payoffs: Arc<Matrix>,
    rounds: usize,
    branches: u32,
    remaining: usize,
    total: f64,
    rng: ChaCha20Rng,
}

impl RepeatedMatrixGame {
    /// `payoffs` holds the row player's payoff in `[0, 1]`; the column
    /// player receives the complement.
    pub fn new(payoffs: Matrix, rounds: usize, branches: u32) -> Self {
        assert!(payoffs.rows() > 0 && payoffs.cols() > 0, "empty payoff matrix");
        assert!(rounds > 0, "at least one round");
        assert!(branches > 0, "at least one chance branch");
        RepeatedMatrixGame {
            payoffs: Arc::new(payoffs),
            rounds,
            branches,
            remaining: rounds,
            total: 0.0,
            rng: ChaCha20Rng::seed_from_u64(0),
        }
    }

    pub fn payoffs(&self) -> &Matrix {
        &self.payoffs
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl State for RepeatedMatrixGame {
    type Action = usize;
    type Observation = u32;

    fn actions(&self) -> (Vec<usize>, Vec<usize>) {
        if self.remaining == 0 {
            return (Vec::new(), Vec::new());
        }
        ((0..self.payoffs.rows()).collect(), (0..self.payoffs.cols()).collect())
    }

    fn apply_actions(&mut self, row_action: usize, col_action: usize) -> Transition<u32> {
        self.total += self.payoffs[(row_action, col_action)];
        self.remaining -= 1;
        Transition {
            observation: self.rng.gen_range(0..self.branches),
            probability: 1.0 / self.branches as f64,
        }
    }

    fn is_terminal(&self) -> bool {
        self.remaining == 0
    }

    /// Average row payoff over the rounds played.
    fn payoff(&self) -> Value {
        Value::constant_sum(self.total / self.rounds as f64)
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> RepeatedMatrixGame {
        RepeatedMatrixGame::new(Matrix::from_rows(&[vec![0.5, 0.9], vec![0.1, 0.5]]), 3, 4)
    }

    #[test]
    fn test_average_payoff() {
        let mut state = game();
        assert_eq!(state.remaining(), 3);
        state.apply_actions(0, 1);
        state.apply_actions(1, 0);
        assert_eq!(state.remaining(), 1);
        assert!(!state.is_terminal());
        state.apply_actions(0, 0);
        assert_eq!(state.remaining(), 0);
        assert!(state.is_terminal());
        assert_eq!(state.payoffs().rows(), 2);
        let payoff = state.payoff();
        assert!((payoff.row - 0.5).abs() < 1e-10);
        assert!((payoff.col - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_observations_follow_seed() {
        let draw = |seed| {
            let mut state = game();
            state.reseed(seed);
            (0..3).map(|_| state.apply_actions(0, 0).observation).collect::<Vec<_>>()
        };
        assert_eq!(draw(5), draw(5));
        let mut state = game();
        let t = state.apply_actions(1, 1);
        assert!(t.observation < 4);
        assert!((t.probability - 0.25).abs() < 1e-10);
    }
}
