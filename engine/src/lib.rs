//! duet Engine - concurrent bandit-driven tree search
//!
//! Searches simultaneous-move stochastic games by repeated randomized
//! playouts over a lazily grown tree of matrix (decision) and chance nodes.
//! A pluggable [`bandit::BanditAlgorithm`] decides where to explore at each
//! node; [`search::TreeBandit`] runs playouts on one thread or on a pool of
//! workers sharing the same [`tree::Tree`], guarded per node by a
//! [`lock::LockStrategy`].
//!
//! The engine knows nothing about concrete games: they plug in through the
//! [`game::State`] and [`game::Model`] traits.

pub mod arena;
pub mod bandit;
pub mod config;
pub mod error;
pub mod game;
pub mod lock;
pub mod math;
pub mod model;
pub mod node;
pub mod search;
pub mod solver;
pub mod tree;

pub use bandit::{BanditAlgorithm, Exp3, Exp3p, MatrixUcb, Outcome, Random, Ucb};
pub use config::{Backup, SearchConfig};
pub use error::{IntegrityError, SearchError};
pub use game::{Model, ModelOutput, State, Transition, Value};
pub use lock::{LockStrategy, PerNodeLock, PooledLock};
pub use model::{MonteCarloModel, UniformModel};
pub use search::{Budget, RunReport, TreeBandit};
pub use solver::{RegretMatchingSolver, Solver};
pub use tree::{Tree, TreeSummary};
