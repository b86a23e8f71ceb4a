//! Tree-bandit search: the recursive playout and the drivers that run it.
//!
//! One playout clones the root state, descends the shared tree by letting
//! the bandit pick a joint action at every expanded node, expands the first
//! unexpanded node it meets, and folds the resulting value back up through
//! the bandit's update hooks.
//!
//! Node locks are held only around bandit calls (`expand`, `select`,
//! `update_*`); applying actions, model inference and the recursion itself
//! run unlocked on thread-local clones. Which mutex a node uses is decided
//! by the tree's [`LockStrategy`], so the single-threaded loop, the
//! per-node-mutex driver and the mutex-pool driver share this code.

use crate::bandit::{BanditAlgorithm, Outcome, Reach};
use crate::config::{Backup, SearchConfig};
use crate::error::SearchError;
use crate::game::{Model, State, Value};
use crate::lock::LockStrategy;
use crate::node::MatrixId;
use crate::tree::Tree;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// How long a run lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// A fixed number of playouts.
    Iterations(usize),
    /// Playouts until a wall-clock deadline, checked between playouts.
    Duration(Duration),
}

/// What a run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub iterations: usize,
    pub elapsed: Duration,
    pub threads: usize,
}

/// Tree search driven by a bandit algorithm.
#[derive(Debug, Clone)]
pub struct TreeBandit<B> {
    bandit: B,
    config: SearchConfig,
}

impl<B: BanditAlgorithm> TreeBandit<B> {
    pub fn new(bandit: B) -> Self {
        TreeBandit { bandit, config: SearchConfig::default() }
    }

    pub fn with_config(bandit: B, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(TreeBandit { bandit, config })
    }

    pub fn bandit(&self) -> &B {
        &self.bandit
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn initial_budget(&self, budget: Budget) -> usize {
        match budget {
            Budget::Iterations(n) => n,
            Budget::Duration(_) => self.config.duration_budget_hint,
        }
    }

    /// Single-threaded search from `tree`'s root.
    ///
    /// Every playout starts from a fresh clone of `state`, reseeded from
    /// `rng`, so a run is reproducible from the caller's seed.
    pub fn run<S, M, L, R>(
        &self,
        budget: Budget,
        rng: &mut R,
        state: &S,
        model: &mut M,
        tree: &Tree<S, B, L>,
    ) -> RunReport
    where
        S: State,
        M: Model<S>,
        L: LockStrategy,
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let root = tree.root();
        tree.with_stats(root, |stats| self.bandit.initialize_stats(self.initial_budget(budget), stats));
        debug!("single-threaded search started: {:?}", budget);

        let mut iterations = 0;
        match budget {
            Budget::Iterations(n) => {
                for _ in 0..n {
                    self.playout(rng, state, model, tree);
                }
                iterations = n;
            }
            Budget::Duration(limit) => {
                while start.elapsed() < limit {
                    self.playout(rng, state, model, tree);
                    iterations += 1;
                }
            }
        }

        let report = RunReport { iterations, elapsed: start.elapsed(), threads: 1 };
        debug!(
            "search finished: {} playouts in {:?}, {} matrix nodes",
            report.iterations,
            report.elapsed,
            tree.matrix_count()
        );
        report
    }

    /// Multi-threaded search on `config.threads` workers sharing `tree`.
    ///
    /// Each worker owns a clone of `state` and `model` and a private PRNG
    /// seeded from `rng`. An iteration budget is split so the workers
    /// together run exactly `n` playouts. A panicking worker aborts the run.
    pub fn run_threaded<S, M, L, R>(
        &self,
        budget: Budget,
        rng: &mut R,
        state: &S,
        model: &M,
        tree: &Tree<S, B, L>,
    ) -> Result<RunReport, SearchError>
    where
        S: State,
        M: Model<S>,
        L: LockStrategy,
        R: Rng + ?Sized,
    {
        let threads = self.config.threads;
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        let start = Instant::now();
        let root = tree.root();
        tree.with_stats(root, |stats| self.bandit.initialize_stats(self.initial_budget(budget), stats));
        debug!("threaded search started: {:?} on {} threads", budget, threads);

        let completed = AtomicUsize::new(0);
        let deadline = match budget {
            Budget::Duration(limit) => Some(start + limit),
            Budget::Iterations(_) => None,
        };

        // Worker clones and seeds come from the calling thread.
        let workers: Vec<(usize, u64, S, M)> = (0..threads)
            .map(|worker| {
                let quota = match budget {
                    Budget::Iterations(n) => n / threads + usize::from(worker < n % threads),
                    Budget::Duration(_) => usize::MAX,
                };
                let mut model = model.clone();
                model.reseed(rng.gen());
                (quota, rng.gen(), state.clone(), model)
            })
            .collect();

        pool.scope(|scope| {
            for (quota, seed, state, mut model) in workers {
                let completed = &completed;
                scope.spawn(move |_| {
                    let mut rng = ChaCha20Rng::seed_from_u64(seed);
                    let mut done = 0;
                    while done < quota && deadline.map_or(true, |d| Instant::now() < d) {
                        self.playout(&mut rng, &state, &mut model, tree);
                        done += 1;
                    }
                    completed.fetch_add(done, Ordering::Relaxed);
                });
            }
        });

        let report = RunReport {
            iterations: completed.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
            threads,
        };
        debug!(
            "search finished: {} playouts in {:?} on {} threads, {} matrix nodes",
            report.iterations,
            report.elapsed,
            threads,
            tree.matrix_count()
        );
        Ok(report)
    }

    fn playout<S, M, L, R>(&self, rng: &mut R, state: &S, model: &mut M, tree: &Tree<S, B, L>)
    where
        S: State,
        M: Model<S>,
        L: LockStrategy,
        R: Rng + ?Sized,
    {
        let mut state = state.clone();
        state.reseed(rng.gen());
        self.run_iteration(rng, &mut state, model, tree, tree.root(), None);
    }

    /// One recursive playout step from node `id`, which `state` corresponds
    /// to. Returns the leaf value of the playout.
    ///
    /// `reach` describes how the node was reached from its parent and is
    /// `None` at the root.
    pub fn run_iteration<S, M, L, R>(
        &self,
        rng: &mut R,
        state: &mut S,
        model: &mut M,
        tree: &Tree<S, B, L>,
        id: MatrixId,
        reach: Option<Reach>,
    ) -> Value
    where
        S: State,
        M: Model<S>,
        L: LockStrategy,
        R: Rng + ?Sized,
    {
        let node = tree.matrix(id);
        if node.is_terminal() {
            return state.payoff();
        }

        if !node.is_expanded() {
            if state.is_terminal() {
                tree.expand(id, Vec::new(), Vec::new(), true, |_| {});
                return state.payoff();
            }
            let (row_actions, col_actions) = state.actions();
            let (rows, cols) = (row_actions.len(), col_actions.len());
            assert!(
                rows > 0 && cols > 0,
                "non-terminal state has no legal actions ({} rows, {} cols)",
                rows,
                cols
            );
            let output = model.inference(state);
            tree.expand(id, row_actions, col_actions, false, |stats| {
                self.bandit.expand(stats, rows, cols, &output, reach)
            });
            if self.config.return_if_expand {
                return output.value;
            }
        }

        let mut outcome = Outcome::default();
        let child_reach = tree.with_stats(id, |stats| {
            self.bandit.select(rng, stats, &mut outcome);
            self.bandit.reach(stats, &outcome)
        });

        let row_action = node.row_actions()[outcome.row_idx];
        let col_action = node.col_actions()[outcome.col_idx];
        let transition = state.apply_actions(row_action, col_action);
        let chance = tree.access_chance(id, outcome.row_idx, outcome.col_idx);
        let child = tree.access_matrix(chance, &transition.observation);

        let leaf = self.run_iteration(
            rng,
            state,
            model,
            tree,
            child,
            Some(child_reach.through(transition.probability)),
        );

        outcome.value = match self.config.backup {
            Backup::Leaf => leaf,
            Backup::Average => tree.with_stats(child, |stats| {
                if self.bandit.visits(stats) > 0 {
                    self.bandit.empirical_value(stats)
                } else {
                    leaf
                }
            }),
        };
        tree.with_stats_and_chance(id, chance, |stats, chance_stats| {
            self.bandit.update_matrix_stats(stats, &outcome);
            self.bandit.update_chance_stats(chance_stats, &outcome);
        });
        leaf
    }

    /// Visit-count strategies at a node.
    pub fn empirical_strategies<S: State, L: LockStrategy>(
        &self,
        tree: &Tree<S, B, L>,
        id: MatrixId,
    ) -> (Vec<f64>, Vec<f64>) {
        tree.with_stats(id, |stats| self.bandit.empirical_strategies(stats))
    }

    /// Visit-averaged value at a node.
    pub fn empirical_value<S: State, L: LockStrategy>(&self, tree: &Tree<S, B, L>, id: MatrixId) -> Value {
        tree.with_stats(id, |stats| self.bandit.empirical_value(stats))
    }

    pub fn visits<S: State, L: LockStrategy>(&self, tree: &Tree<S, B, L>, id: MatrixId) -> u64 {
        tree.visits(&self.bandit, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandit::{Exp3, Exp3p, MatrixUcb};
    use crate::game::Transition;
    use crate::lock::{PerNodeLock, PooledLock};
    use crate::model::UniformModel;
    use crate::solver::RegretMatchingSolver;

    /// One simultaneous move on a fixed 2x2 constant-sum matrix.
    #[derive(Clone)]
    struct OneShot {
        payoffs: [[f64; 2]; 2],
        played: Option<(usize, usize)>,
    }

    impl OneShot {
        fn dominant() -> Self {
            OneShot { payoffs: [[0.6, 0.9], [0.1, 0.4]], played: None }
        }
    }

    impl State for OneShot {
        type Action = usize;
        type Observation = ();

        fn actions(&self) -> (Vec<usize>, Vec<usize>) {
            if self.played.is_some() {
                return (Vec::new(), Vec::new());
            }
            (vec![0, 1], vec![0, 1])
        }

        fn apply_actions(&mut self, row_action: usize, col_action: usize) -> Transition<()> {
            self.played = Some((row_action, col_action));
            Transition { observation: (), probability: 1.0 }
        }

        fn is_terminal(&self) -> bool {
            self.played.is_some()
        }

        fn payoff(&self) -> Value {
            let (r, c) = self.played.expect("payoff of an unfinished game");
            Value::constant_sum(self.payoffs[r][c])
        }
    }

    /// Non-terminal state without actions.
    #[derive(Clone)]
    struct Stuck;

    impl State for Stuck {
        type Action = u8;
        type Observation = ();

        fn actions(&self) -> (Vec<u8>, Vec<u8>) {
            (vec![0], Vec::new())
        }

        fn apply_actions(&mut self, _row: u8, _col: u8) -> Transition<()> {
            Transition { observation: (), probability: 1.0 }
        }

        fn is_terminal(&self) -> bool {
            false
        }

        fn payoff(&self) -> Value {
            Value::default()
        }
    }

    fn seeded(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_first_playout_only_expands() {
        let search = TreeBandit::new(Exp3::default());
        let tree: Tree<OneShot, Exp3> = Tree::new();
        let report = search.run(
            Budget::Iterations(1),
            &mut seeded(0),
            &OneShot::dominant(),
            &mut UniformModel::default(),
            &tree,
        );
        assert_eq!(report.iterations, 1);
        assert!(tree.matrix(tree.root()).is_expanded());
        assert_eq!(tree.matrix_count(), 1);
        assert_eq!(search.visits(&tree, tree.root()), 0);

        search.run(Budget::Iterations(1), &mut seeded(1), &OneShot::dominant(), &mut UniformModel::default(), &tree);
        assert_eq!(tree.matrix_count(), 2);
        assert_eq!(search.visits(&tree, tree.root()), 1);
    }

    #[test]
    fn test_descend_after_expand() {
        let config = SearchConfig::default().with_return_if_expand(false);
        let search = TreeBandit::with_config(Exp3::default(), config).unwrap();
        let tree: Tree<OneShot, Exp3> = Tree::new();
        search.run(Budget::Iterations(1), &mut seeded(0), &OneShot::dominant(), &mut UniformModel::default(), &tree);
        assert_eq!(tree.matrix_count(), 2);
        assert_eq!(search.visits(&tree, tree.root()), 1);
    }

    #[test]
    fn test_terminal_root() {
        let search = TreeBandit::new(Exp3::default());
        let tree: Tree<OneShot, Exp3> = Tree::new();
        let mut state = OneShot::dominant();
        state.apply_actions(0, 1);
        search.run(Budget::Iterations(10), &mut seeded(0), &state, &mut UniformModel::default(), &tree);
        let root = tree.matrix(tree.root());
        assert!(root.is_terminal());
        assert!(root.is_expanded());
        assert_eq!(tree.matrix_count(), 1);
    }

    #[test]
    #[should_panic(expected = "no legal actions")]
    fn test_missing_actions_is_fatal() {
        let search = TreeBandit::new(Exp3::default());
        let tree: Tree<Stuck, Exp3> = Tree::new();
        search.run(Budget::Iterations(1), &mut seeded(0), &Stuck, &mut UniformModel::default(), &tree);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SearchConfig::default().with_threads(0);
        assert!(matches!(
            TreeBandit::with_config(Exp3::default(), config),
            Err(SearchError::ZeroThreads)
        ));
    }

    #[test]
    fn test_finds_dominant_strategy() {
        let search = TreeBandit::new(Exp3p::new());
        let tree: Tree<OneShot, Exp3p> = Tree::new();
        search.run(Budget::Iterations(5_000), &mut seeded(4), &OneShot::dominant(), &mut UniformModel::default(), &tree);
        let (row, col) = search.empirical_strategies(&tree, tree.root());
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        assert!(row[0] > 0.7);
        assert!(col[0] > 0.7);
        let value = search.empirical_value(&tree, tree.root());
        assert!(value.row > 0.5 && value.row < 0.9);
        assert!((value.row + value.col - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_single_thread_is_reproducible() {
        let search = TreeBandit::new(Exp3::default());
        let run = |seed| {
            let tree: Tree<OneShot, Exp3> = Tree::new();
            search.run(Budget::Iterations(500), &mut seeded(seed), &OneShot::dominant(), &mut UniformModel::default(), &tree);
            search.empirical_strategies(&tree, tree.root())
        };
        assert_eq!(run(17), run(17));
    }

    #[test]
    fn test_average_backup() {
        let search = TreeBandit::with_config(MatrixUcb::<RegretMatchingSolver>::default(), SearchConfig::averaged()).unwrap();
        let tree: Tree<OneShot, MatrixUcb<RegretMatchingSolver>> = Tree::new();
        search.run(Budget::Iterations(300), &mut seeded(8), &OneShot::dominant(), &mut UniformModel::default(), &tree);
        assert_eq!(search.visits(&tree, tree.root()), 300);
        let value = search.empirical_value(&tree, tree.root());
        assert!(value.row >= 0.1 && value.row <= 0.9);
    }

    #[test]
    fn test_threaded_iteration_split() {
        let config = SearchConfig::default().with_threads(3);
        let search = TreeBandit::with_config(Exp3::default(), config).unwrap();
        let tree: Tree<OneShot, Exp3, PerNodeLock> = Tree::new();
        let report = search
            .run_threaded(Budget::Iterations(1_000), &mut seeded(2), &OneShot::dominant(), &UniformModel::default(), &tree)
            .unwrap();
        assert_eq!(report.iterations, 1_000);
        assert_eq!(report.threads, 3);
        // Every playout but the expanding ones updates the root.
        let visits = search.visits(&tree, tree.root());
        assert!(visits >= 997 && visits <= 999);
        assert!(tree.verify().is_ok());
    }

    #[test]
    fn test_threaded_pool_with_duration() {
        let config = SearchConfig::default().with_threads(4);
        let search = TreeBandit::with_config(Exp3::default(), config).unwrap();
        let tree: Tree<OneShot, Exp3, PooledLock> = Tree::with_locking(PooledLock::new(2).unwrap());
        let report = search
            .run_threaded(
                Budget::Duration(Duration::from_millis(50)),
                &mut seeded(3),
                &OneShot::dominant(),
                &UniformModel::default(),
                &tree,
            )
            .unwrap();
        assert!(report.iterations > 0);
        assert!(report.elapsed >= Duration::from_millis(50));
        assert_eq!(tree.verify().unwrap().matrix_nodes, tree.matrix_count());
    }
}
