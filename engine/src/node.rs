//! Node definitions for the search tree
//!
//! A [`MatrixNode`] is a simultaneous-move decision point; a [`ChanceNode`]
//! is the stochastic branch following one joint action pair. Nodes refer to
//! each other by integer id into the tree's arenas, never by pointer.
//!
//! Bandit statistics live in a [`StatsCell`]. The cell hands out mutable
//! access only through the tree, which holds the owning matrix node's lock
//! for the duration; a chance node's statistics are guarded by its parent
//! matrix node's lock.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, RwLock};

/// Index of a matrix node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixId(u32);

impl MatrixId {
    pub(crate) fn new(index: usize) -> Self {
        MatrixId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a chance node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChanceId(u32);

impl ChanceId {
    pub(crate) fn new(index: usize) -> Self {
        ChanceId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interior-mutable statistics guarded by an external lock.
pub(crate) struct StatsCell<T>(UnsafeCell<T>);

// Access is serialized by the owning node's lock; see `get_mut`.
unsafe impl<T: Send> Sync for StatsCell<T> {}

impl<T> StatsCell<T> {
    pub(crate) fn new(value: T) -> Self {
        StatsCell(UnsafeCell::new(value))
    }

    /// # Safety
    /// The caller must hold the lock guarding this cell for as long as the
    /// returned reference lives, and must not create a second reference.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }
}

/// Actions and child slots fixed when a node is expanded.
pub(crate) struct Expansion<A> {
    pub(crate) row_actions: Vec<A>,
    pub(crate) col_actions: Vec<A>,
    /// Dense `rows * cols` table of chance children, row-major.
    pub(crate) children: Box<[OnceLock<ChanceId>]>,
}

impl<A> Expansion<A> {
    pub(crate) fn new(row_actions: Vec<A>, col_actions: Vec<A>) -> Self {
        let slots = row_actions.len() * col_actions.len();
        Expansion {
            row_actions,
            col_actions,
            children: (0..slots).map(|_| OnceLock::new()).collect(),
        }
    }
}

/// A simultaneous-move decision point.
///
/// `A` is the game's action type, `M` the bandit's matrix statistics and
/// `H` the locking strategy's per-node handle.
pub struct MatrixNode<A, M, H> {
    parent: Option<ChanceId>,
    expanded: AtomicBool,
    terminal: AtomicBool,
    pub(crate) expansion: OnceLock<Expansion<A>>,
    pub(crate) lock: H,
    pub(crate) stats: StatsCell<M>,
}

impl<A, M: Default, H: Default> MatrixNode<A, M, H> {
    pub(crate) fn new(parent: Option<ChanceId>) -> Self {
        MatrixNode {
            parent,
            expanded: AtomicBool::new(false),
            terminal: AtomicBool::new(false),
            expansion: OnceLock::new(),
            lock: H::default(),
            stats: StatsCell::new(M::default()),
        }
    }
}

impl<A, M, H> MatrixNode<A, M, H> {
    /// The chance node this node was reached through; `None` for the root.
    pub fn parent(&self) -> Option<ChanceId> {
        self.parent
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.load(Ordering::Acquire)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Flags only ever go from false to true. Called with the node locked,
    /// after `expansion` is set.
    pub(crate) fn mark_expanded(&self, terminal: bool) {
        if terminal {
            self.terminal.store(true, Ordering::Release);
        }
        self.expanded.store(true, Ordering::Release);
    }

    /// Number of row actions; 0 before expansion and at terminal nodes.
    pub fn rows(&self) -> usize {
        self.expansion.get().map_or(0, |e| e.row_actions.len())
    }

    /// Number of column actions; 0 before expansion and at terminal nodes.
    pub fn cols(&self) -> usize {
        self.expansion.get().map_or(0, |e| e.col_actions.len())
    }

    pub fn row_actions(&self) -> &[A] {
        match self.expansion.get() {
            Some(e) => &e.row_actions,
            None => &[],
        }
    }

    pub fn col_actions(&self) -> &[A] {
        match self.expansion.get() {
            Some(e) => &e.col_actions,
            None => &[],
        }
    }

    /// Chance child for a joint action, if it has been created.
    pub fn child(&self, row_idx: usize, col_idx: usize) -> Option<ChanceId> {
        let expansion = self.expansion.get()?;
        let cols = expansion.col_actions.len();
        if row_idx >= expansion.row_actions.len() || col_idx >= cols {
            return None;
        }
        expansion.children[row_idx * cols + col_idx].get().copied()
    }

    /// All created chance children as `(row_idx, col_idx, id)`.
    pub fn children(&self) -> Vec<(usize, usize, ChanceId)> {
        let Some(expansion) = self.expansion.get() else {
            return Vec::new();
        };
        let cols = expansion.col_actions.len().max(1);
        expansion
            .children
            .iter()
            .enumerate()
            .filter_map(|(slot, child)| child.get().map(|&id| (slot / cols, slot % cols, id)))
            .collect()
    }
}

/// The stochastic branch after one joint action.
///
/// `O` is the game's observation type, `C` the bandit's chance statistics.
pub struct ChanceNode<O, C> {
    parent: MatrixId,
    row_idx: usize,
    col_idx: usize,
    pub(crate) children: RwLock<HashMap<O, MatrixId>>,
    pub(crate) stats: StatsCell<C>,
}

impl<O: Eq + Hash, C: Default> ChanceNode<O, C> {
    pub(crate) fn new(parent: MatrixId, row_idx: usize, col_idx: usize) -> Self {
        ChanceNode {
            parent,
            row_idx,
            col_idx,
            children: RwLock::new(HashMap::new()),
            stats: StatsCell::new(C::default()),
        }
    }
}

impl<O: Clone, C> ChanceNode<O, C> {
    pub fn parent(&self) -> MatrixId {
        self.parent
    }

    pub fn row_idx(&self) -> usize {
        self.row_idx
    }

    pub fn col_idx(&self) -> usize {
        self.col_idx
    }

    /// Snapshot of the observation-keyed matrix children.
    pub fn children(&self) -> Vec<(O, MatrixId)> {
        self.children
            .read()
            .expect("chance node lock poisoned")
            .iter()
            .map(|(obs, &id)| (obs.clone(), id))
            .collect()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().expect("chance node lock poisoned").len()
    }
}
