//! duet Games - reference games for the search engine
//!
//! Small simultaneous-move games with known structure, used by the property
//! tests, the benchmarks and the `duet` command-line harness.

pub mod matrix;
pub mod mold;
pub mod repeated;

pub use matrix::MatrixGame;
pub use mold::MoldState;
pub use repeated::RepeatedMatrixGame;
