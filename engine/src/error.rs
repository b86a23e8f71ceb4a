//! Error types for the search engine.
//!
//! Contract violations (no legal actions at a non-terminal state, poisoned
//! locks) panic instead; these enums cover what a caller can act on.

use crate::node::{ChanceId, MatrixId};
use thiserror::Error;

/// Invalid configuration or runtime setup failure.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("lock pool must contain at least one mutex")]
    EmptyLockPool,

    #[error("duration budget hint must be at least 1")]
    ZeroBudgetHint,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A broken structural invariant found by [`crate::tree::Tree::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("matrix node {0:?} is not allocated")]
    MissingMatrix(MatrixId),

    #[error("chance node {0:?} is not allocated")]
    MissingChance(ChanceId),

    #[error("matrix node {child:?} points at parent {found:?}, expected {expected:?}")]
    MatrixParent {
        child: MatrixId,
        expected: Option<ChanceId>,
        found: Option<ChanceId>,
    },

    #[error("chance node {child:?} points at parent {found:?}, expected {expected:?}")]
    ChanceParent {
        child: ChanceId,
        expected: MatrixId,
        found: MatrixId,
    },

    #[error("chance node {child:?} records action pair ({row_idx}, {col_idx}) but sits in slot ({slot_row}, {slot_col})")]
    ChanceSlot {
        child: ChanceId,
        row_idx: usize,
        col_idx: usize,
        slot_row: usize,
        slot_col: usize,
    },

    #[error("matrix node {0:?} has children but is not expanded")]
    ExpansionFlag(MatrixId),

    #[error("matrix node {0:?} is terminal but not expanded")]
    TerminalNotExpanded(MatrixId),

    #[error("terminal matrix node {0:?} has children")]
    TerminalWithChildren(MatrixId),

    #[error("matrix node {0:?} is reachable more than once")]
    SharedMatrix(MatrixId),

    #[error("{allocated} matrix nodes allocated but {reachable} reachable from the root")]
    Unreachable { allocated: usize, reachable: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(SearchError::ZeroThreads.to_string(), "thread count must be at least 1");
        let err = IntegrityError::Unreachable { allocated: 5, reachable: 3 };
        assert_eq!(
            err.to_string(),
            "5 matrix nodes allocated but 3 reachable from the root"
        );
    }
}
