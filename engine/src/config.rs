//! Search configuration parameters.

use crate::error::SearchError;

/// Which value a node records for the joint action it just played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backup {
    /// Propagate the leaf value of the playout unchanged.
    #[default]
    Leaf,
    /// Record the child's empirical (visit-averaged) value instead, falling
    /// back to the leaf value while the child has no visits.
    Average,
}

/// Configuration for a tree-bandit search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker threads used by the threaded drivers.
    pub threads: usize,

    /// End the playout at the node it expands.
    /// When false, a freshly expanded non-terminal node selects and descends
    /// in the same playout.
    pub return_if_expand: bool,

    pub backup: Backup,

    /// Iteration budget reported to `initialize_stats` for wall-clock runs,
    /// where the true number of playouts is not known up front.
    pub duration_budget_hint: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            return_if_expand: true,
            backup: Backup::Leaf,
            duration_budget_hint: 10_000,
        }
    }
}

impl SearchConfig {
    /// Threaded search on every available core.
    pub fn parallel() -> Self {
        let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::default().with_threads(threads)
    }

    /// Average backup with same-playout descent after expansion.
    pub fn averaged() -> Self {
        Self {
            return_if_expand: false,
            backup: Backup::Average,
            ..Self::default()
        }
    }

    /// Builder pattern: set worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Builder pattern: set the return-after-expand policy.
    pub fn with_return_if_expand(mut self, value: bool) -> Self {
        self.return_if_expand = value;
        self
    }

    /// Builder pattern: set the backup rule.
    pub fn with_backup(mut self, backup: Backup) -> Self {
        self.backup = backup;
        self
    }

    /// Builder pattern: set the budget hint for duration-bounded runs.
    pub fn with_duration_budget_hint(mut self, hint: usize) -> Self {
        self.duration_budget_hint = hint;
        self
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.threads == 0 {
            return Err(SearchError::ZeroThreads);
        }
        if self.duration_budget_hint == 0 {
            return Err(SearchError::ZeroBudgetHint);
        }
        Ok(())
    }
}
