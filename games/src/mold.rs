//! Uniform trees of fixed branching and depth.
//!
//! Every state offers `size` actions to each player; every joint action has a
//! single chance outcome, so the game tree has exactly
//! [`MoldState::tree_size`] matrix nodes. Payoffs are a flat 0.5 each.

use duet_engine::{State, Transition, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoldState {
    pub size: usize,
    pub depth: usize,
}

impl MoldState {
    pub fn new(size: usize, depth: usize) -> Self {
        assert!(size > 0, "mold states need at least one action");
        MoldState { size, depth }
    }

    /// Number of matrix nodes in the full tree: `sum_{k=0..=depth} (size^2)^k`.
    pub fn tree_size(size: usize, depth: usize) -> usize {
        let branching = size * size;
        (0..=depth).map(|k| branching.pow(k as u32)).sum()
    }
}

impl State for MoldState {
    type Action = usize;
    type Observation = u8;

    fn actions(&self) -> (Vec<usize>, Vec<usize>) {
        if self.depth == 0 {
            return (Vec::new(), Vec::new());
        }
        ((0..self.size).collect(), (0..self.size).collect())
    }

    fn apply_actions(&mut self, _row_action: usize, _col_action: usize) -> Transition<u8> {
        self.depth -= 1;
        Transition { observation: 0, probability: 1.0 }
    }

    fn is_terminal(&self) -> bool {
        self.depth == 0
    }

    fn payoff(&self) -> Value {
        Value::constant_sum(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_size() {
        assert_eq!(MoldState::tree_size(2, 2), 21);
        assert_eq!(MoldState::tree_size(3, 2), 91);
        assert_eq!(MoldState::tree_size(1, 5), 6);
        assert_eq!(MoldState::tree_size(3, 0), 1);
    }

    #[test]
    fn test_play_to_terminal() {
        let mut state = MoldState::new(3, 2);
        let (rows, cols) = state.actions();
        assert_eq!(rows.len(), 3);
        assert_eq!(cols.len(), 3);
        let t = state.apply_actions(rows[2], cols[0]);
        assert_eq!(t.observation, 0);
        assert!((t.probability - 1.0).abs() < 1e-10);
        state.apply_actions(0, 0);
        assert!(state.is_terminal());
        assert!(state.actions().0.is_empty());
        assert!((state.payoff().row - 0.5).abs() < 1e-10);
    }
}
