//! duet CLI - run a tree-bandit search on one of the bundled games
//!
//! Prints the root's empirical strategies and value together with a
//! summary of the search tree. Set `RUST_LOG=debug` for per-run logging.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use duet_engine::math::Matrix;
use duet_engine::{
    Backup, BanditAlgorithm, Budget, Exp3, Exp3p, LockStrategy, MatrixUcb, Model, MonteCarloModel, PerNodeLock,
    PooledLock, Random, RegretMatchingSolver, SearchConfig, State, Tree, TreeBandit, Ucb, UniformModel, Value,
};
use duet_games::{MatrixGame, MoldState, RepeatedMatrixGame};
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GameKind {
    /// Uniform tree of `size` actions per player and `depth` moves.
    Mold,
    /// Random constant-sum `size x size` matrix, played once.
    Matrix,
    /// Random constant-sum matrix played `depth` rounds with chance between rounds.
    Repeated,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Exp3,
    Exp3p,
    /// Independent UCB1 per player, exploration constant `--c-uct`.
    Ucb,
    /// UCB over the joint payoff matrix, solved for a mixed strategy.
    MatrixUcb,
    /// Matrix UCB with prior-weighted confidence bounds.
    MatrixPucb,
    /// Uniform random selection.
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LockKind {
    /// One mutex per node.
    Node,
    /// Fixed pool of mutexes shared by all nodes.
    Pool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelKind {
    /// Constant value 0.5, uniform priors.
    Uniform,
    /// One random rollout per expansion.
    Rollout,
}

#[derive(Debug, Parser)]
#[command(name = "duet", version, about = "Tree-bandit search for simultaneous-move games")]
struct Args {
    #[arg(long, value_enum, default_value = "mold")]
    game: GameKind,

    #[arg(long, default_value_t = 3)]
    size: usize,

    /// Tree depth (mold) or number of rounds (repeated).
    #[arg(long, default_value_t = 4)]
    depth: usize,

    /// Chance outcomes between rounds of the repeated game.
    #[arg(long, default_value_t = 2)]
    branches: u32,

    #[arg(long, value_enum, default_value = "exp3p")]
    algorithm: Algorithm,

    #[arg(long, value_enum, default_value = "uniform")]
    model: ModelKind,

    #[arg(long, value_enum, default_value = "node")]
    lock: LockKind,

    #[arg(long, default_value_t = duet_engine::lock::DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Worker threads; 1 runs the single-threaded loop.
    #[arg(long, default_value_t = 1)]
    threads: usize,

    #[arg(long, default_value_t = 10_000)]
    iterations: usize,

    /// Wall-clock budget in milliseconds; overrides --iterations.
    #[arg(long)]
    millis: Option<u64>,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Keep descending after expanding a node in the same playout.
    #[arg(long)]
    descend: bool,

    /// Back up the child's empirical value instead of the leaf value.
    #[arg(long)]
    average: bool,

    #[arg(long, default_value_t = 0.01)]
    gamma: f64,

    /// Exploration constant of the UCB variants.
    #[arg(long, default_value_t = 2.0)]
    c_uct: f64,

    #[arg(long, default_value_t = 0.005)]
    expl_threshold: f64,

    #[arg(long, default_value_t = 1_000)]
    solver_iterations: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("duet v{}: {:?}", env!("CARGO_PKG_VERSION"), args);
    anyhow::ensure!(args.size > 0, "--size must be positive");
    if let GameKind::Repeated = args.game {
        anyhow::ensure!(args.depth > 0 && args.branches > 0, "--depth and --branches must be positive");
    }

    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);
    match args.game {
        GameKind::Mold => with_model(&args, MoldState::new(args.size, args.depth)),
        GameKind::Matrix => with_model(&args, MatrixGame::random_constant_sum(&mut rng, args.size, args.size)),
        GameKind::Repeated => {
            let payoffs = Matrix::from_fn(args.size, args.size, |_, _| rng.gen::<f64>());
            let game = RepeatedMatrixGame::new(payoffs, args.depth, args.branches);
            info!("{} rounds over payoffs {:?}", game.remaining(), game.payoffs());
            with_model(&args, game)
        }
    }
}

fn with_model<S: State>(args: &Args, state: S) -> Result<()> {
    match args.model {
        ModelKind::Uniform => with_bandit(args, state, UniformModel::new(Value::constant_sum(0.5))),
        ModelKind::Rollout => with_bandit(args, state, MonteCarloModel::new(args.seed)),
    }
}

fn with_bandit<S: State, M: Model<S>>(args: &Args, state: S, model: M) -> Result<()> {
    anyhow::ensure!((0.0..=1.0).contains(&args.gamma), "--gamma must lie in [0, 1], got {}", args.gamma);
    anyhow::ensure!(args.c_uct >= 0.0, "--c-uct must be non-negative, got {}", args.c_uct);
    let solver = RegretMatchingSolver::new(args.solver_iterations);
    match args.algorithm {
        Algorithm::Exp3 => {
            let bandit = Exp3::new(args.gamma);
            info!("exp3 with gamma {}", bandit.gamma());
            with_lock(args, state, model, bandit)
        }
        Algorithm::Exp3p => with_lock(args, state, model, Exp3p::new()),
        Algorithm::Ucb => with_lock(args, state, model, Ucb::new(args.c_uct)),
        Algorithm::MatrixUcb => {
            with_lock(args, state, model, MatrixUcb::new(solver, args.c_uct, args.expl_threshold))
        }
        Algorithm::MatrixPucb => {
            with_lock(args, state, model, MatrixUcb::pucb(solver, args.c_uct, args.expl_threshold))
        }
        Algorithm::Random => with_lock(args, state, model, Random::new()),
    }
}

fn with_lock<S: State, M: Model<S>, B: BanditAlgorithm>(args: &Args, state: S, model: M, bandit: B) -> Result<()> {
    match args.lock {
        LockKind::Node => search(args, state, model, bandit, Tree::<S, B, PerNodeLock>::new()),
        LockKind::Pool => search(args, state, model, bandit, Tree::with_locking(PooledLock::new(args.pool_size)?)),
    }
}

fn search<S, M, B, L>(args: &Args, state: S, mut model: M, bandit: B, tree: Tree<S, B, L>) -> Result<()>
where
    S: State,
    M: Model<S>,
    B: BanditAlgorithm,
    L: LockStrategy,
{
    let config = SearchConfig::default()
        .with_threads(args.threads)
        .with_return_if_expand(!args.descend)
        .with_backup(if args.average { Backup::Average } else { Backup::Leaf });
    let search = TreeBandit::with_config(bandit, config)?;
    info!("search config: {:?}", search.config());
    let budget = match args.millis {
        Some(ms) => Budget::Duration(Duration::from_millis(ms)),
        None => Budget::Iterations(args.iterations),
    };

    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);
    let report = if args.threads == 1 {
        search.run(budget, &mut rng, &state, &mut model, &tree)
    } else {
        search.run_threaded(budget, &mut rng, &state, &model, &tree)?
    };
    let summary = tree.verify()?;
    info!(
        "{} playouts in {:?} on {} threads",
        report.iterations, report.elapsed, report.threads
    );

    let root = tree.root();
    let node = tree.matrix(root);
    let (row, col) = search.empirical_strategies(&tree, root);
    let value = search.empirical_value(&tree, root);

    println!("Root ({} visits):", search.visits(&tree, root));
    println!("  Row player:");
    for (action, p) in node.row_actions().iter().zip(&row) {
        println!("    {:?}: {:.4}", action, p);
    }
    println!("  Column player:");
    for (action, p) in node.col_actions().iter().zip(&col) {
        println!("    {:?}: {:.4}", action, p);
    }
    println!("  Value: row {:.4}, col {:.4}", value.row, value.col);
    println!("Tree:");
    println!("  Matrix nodes: {}", summary.matrix_nodes);
    println!("  Chance nodes: {}", summary.chance_nodes);
    println!("  Expanded: {} ({} terminal)", summary.expanded_nodes, summary.terminal_nodes);
    println!("  Max depth: {}", summary.max_depth);
    println!(
        "  Throughput: {:.0} playouts/sec",
        report.iterations as f64 / report.elapsed.as_secs_f64().max(1e-9)
    );
    Ok(())
}
