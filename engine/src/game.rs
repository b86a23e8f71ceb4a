//! Contracts the search consumes from the outside world.
//!
//! A [`State`] is a simultaneous-move stochastic game position, a [`Model`]
//! estimates values and priors for a state. Neither needs to be `Sync`:
//! every worker thread owns private clones.

use std::fmt::Debug;
use std::hash::Hash;
use std::ops::{Add, AddAssign};

/// Payoff pair, one entry per player.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Value {
    pub row: f64,
    pub col: f64,
}

impl Value {
    pub fn new(row: f64, col: f64) -> Self {
        Value { row, col }
    }

    /// Payoff of a constant-sum game normalized to a total of 1.
    pub fn constant_sum(row: f64) -> Self {
        Value { row, col: 1.0 - row }
    }

    pub fn scale(self, factor: f64) -> Self {
        Value { row: self.row * factor, col: self.col * factor }
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        Value { row: self.row + rhs.row, col: self.col + rhs.col }
    }
}

impl AddAssign for Value {
    fn add_assign(&mut self, rhs: Value) {
        self.row += rhs.row;
        self.col += rhs.col;
    }
}

/// Result of applying a joint action: which chance outcome occurred and how
/// likely it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<O> {
    pub observation: O,
    pub probability: f64,
}

/// Model estimate for a state: a value and a prior policy per player.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub value: Value,
    pub row_policy: Vec<f64>,
    pub col_policy: Vec<f64>,
}

impl ModelOutput {
    /// Uniform priors over `rows` and `cols` actions.
    pub fn uniform(value: Value, rows: usize, cols: usize) -> Self {
        ModelOutput {
            value,
            row_policy: uniform(rows),
            col_policy: uniform(cols),
        }
    }
}

fn uniform(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// A position in a simultaneous-move stochastic game.
///
/// Applying actions mutates the state in place; the search clones the root
/// state once per playout.
pub trait State: Clone + Send {
    type Action: Copy + Send + Sync + Debug;
    type Observation: Clone + Eq + Hash + Send + Sync + Debug;

    /// Legal actions for the row and column player.
    fn actions(&self) -> (Vec<Self::Action>, Vec<Self::Action>);

    /// Play both actions simultaneously and resolve chance.
    fn apply_actions(
        &mut self,
        row_action: Self::Action,
        col_action: Self::Action,
    ) -> Transition<Self::Observation>;

    fn is_terminal(&self) -> bool;

    /// Payoff of a terminal state.
    fn payoff(&self) -> Value;

    /// Re-key the state's chance source so playouts from clones diverge.
    fn reseed(&mut self, _seed: u64) {}
}

/// Value and policy estimator.
///
/// `inference` takes `&mut self` because models may carry their own PRNG
/// (rollouts) or caches.
pub trait Model<S: State>: Clone + Send {
    fn inference(&mut self, state: &S) -> ModelOutput;

    fn reseed(&mut self, _seed: u64) {}
}
