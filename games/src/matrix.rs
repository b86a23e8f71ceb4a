//! One-shot bimatrix games.

use duet_engine::math::Matrix;
use duet_engine::{State, Transition, Value};
use rand::Rng;
use std::sync::Arc;

/// Both players move once, then the game ends with the payoffs of the
/// chosen cell.
#[derive(Debug, Clone)]
pub struct MatrixGame {
    row_payoffs: Arc<Matrix>,
    col_payoffs: Arc<Matrix>,
    played: Option<(usize, usize)>,
}

impl MatrixGame {
    pub fn new(row_payoffs: Matrix, col_payoffs: Matrix) -> Self {
        assert!(
            row_payoffs.rows() == col_payoffs.rows() && row_payoffs.cols() == col_payoffs.cols(),
            "payoff matrices must have the same shape"
        );
        assert!(row_payoffs.rows() > 0 && row_payoffs.cols() > 0, "empty payoff matrix");
        MatrixGame {
            row_payoffs: Arc::new(row_payoffs),
            col_payoffs: Arc::new(col_payoffs),
            played: None,
        }
    }

    /// Constant-sum game: the column player gets `1 - row`.
    pub fn constant_sum(row_payoffs: Matrix) -> Self {
        let col_payoffs = row_payoffs.map(|x| 1.0 - x);
        Self::new(row_payoffs, col_payoffs)
    }

    /// Constant-sum game with row payoffs drawn uniformly from `[0, 1)`.
    pub fn random_constant_sum<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Self {
        Self::constant_sum(Matrix::from_fn(rows, cols, |_, _| rng.gen::<f64>()))
    }

    pub fn row_payoffs(&self) -> &Matrix {
        &self.row_payoffs
    }

    pub fn col_payoffs(&self) -> &Matrix {
        &self.col_payoffs
    }
}

impl State for MatrixGame {
    type Action = usize;
    type Observation = ();

    fn actions(&self) -> (Vec<usize>, Vec<usize>) {
        if self.played.is_some() {
            return (Vec::new(), Vec::new());
        }
        ((0..self.row_payoffs.rows()).collect(), (0..self.row_payoffs.cols()).collect())
    }

    fn apply_actions(&mut self, row_action: usize, col_action: usize) -> Transition<()> {
        self.played = Some((row_action, col_action));
        Transition { observation: (), probability: 1.0 }
    }

    fn is_terminal(&self) -> bool {
        self.played.is_some()
    }

    fn payoff(&self) -> Value {
        match self.played {
            Some(cell) => Value::new(self.row_payoffs[cell], self.col_payoffs[cell]),
            None => Value::default(),
        }
    }
}
