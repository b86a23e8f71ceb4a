//! Reference models.
//!
//! Both return uniform priors. [`UniformModel`] reports a constant value,
//! useful for testing the search without any game knowledge;
//! [`MonteCarloModel`] estimates the value with one random rollout.

use crate::game::{Model, ModelOutput, State, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Constant value, uniform priors. Terminal states report their payoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformModel {
    pub value: Value,
}

impl UniformModel {
    pub fn new(value: Value) -> Self {
        UniformModel { value }
    }
}

impl<S: State> Model<S> for UniformModel {
    fn inference(&mut self, state: &S) -> ModelOutput {
        if state.is_terminal() {
            return ModelOutput::uniform(state.payoff(), 0, 0);
        }
        let (rows, cols) = state.actions();
        ModelOutput::uniform(self.value, rows.len(), cols.len())
    }
}

/// Uniform priors, value of a uniformly random playout to the end of the game.
///
/// Each worker thread clones the model, so every clone must be reseeded to
/// avoid replaying the same rollouts.
#[derive(Debug, Clone)]
pub struct MonteCarloModel {
    rng: ChaCha20Rng,
}

impl MonteCarloModel {
    pub fn new(seed: u64) -> Self {
        MonteCarloModel { rng: ChaCha20Rng::seed_from_u64(seed) }
    }

    fn rollout<S: State>(&mut self, state: &S) -> Value {
        let mut state = state.clone();
        state.reseed(self.rng.gen());
        while !state.is_terminal() {
            let (rows, cols) = state.actions();
            assert!(
                !rows.is_empty() && !cols.is_empty(),
                "non-terminal state has no legal actions"
            );
            let row_action = rows[self.rng.gen_range(0..rows.len())];
            let col_action = cols[self.rng.gen_range(0..cols.len())];
            state.apply_actions(row_action, col_action);
        }
        state.payoff()
    }
}

impl<S: State> Model<S> for MonteCarloModel {
    fn inference(&mut self, state: &S) -> ModelOutput {
        let (rows, cols) = state.actions();
        let value = self.rollout(state);
        ModelOutput::uniform(value, rows.len(), cols.len())
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }
}
