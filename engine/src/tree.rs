//! The shared search tree.
//!
//! Matrix and chance nodes live in two append-only arenas and link to each
//! other by id. The tree is shared by reference between worker threads:
//! structure grows through `OnceLock`/`RwLock` slots, while bandit
//! statistics are reachable only through [`Tree::with_stats`] and
//! [`Tree::with_stats_and_chance`], which hold the node's lock.

use crate::arena::Arena;
use crate::bandit::BanditAlgorithm;
use crate::error::IntegrityError;
use crate::game::State;
use crate::lock::{LockStrategy, PerNodeLock};
use crate::node::{ChanceId, ChanceNode, Expansion, MatrixId, MatrixNode};
use std::collections::hash_map::Entry;
use std::collections::HashSet;

/// Matrix node type of a tree over state `S`, bandit `B` and locking `L`.
pub type MatrixOf<S, B, L> =
    MatrixNode<<S as State>::Action, <B as BanditAlgorithm>::MatrixStats, <L as LockStrategy>::Handle>;

/// Chance node type of a tree over state `S` and bandit `B`.
pub type ChanceOf<S, B> = ChanceNode<<S as State>::Observation, <B as BanditAlgorithm>::ChanceStats>;

/// Shape of a verified tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeSummary {
    pub matrix_nodes: usize,
    pub chance_nodes: usize,
    pub expanded_nodes: usize,
    pub terminal_nodes: usize,
    /// Longest root-to-node path, counted in matrix nodes below the root.
    pub max_depth: usize,
}

pub struct Tree<S: State, B: BanditAlgorithm, L: LockStrategy = PerNodeLock> {
    matrix: Arena<MatrixOf<S, B, L>>,
    chance: Arena<ChanceOf<S, B>>,
    locking: L,
    root: MatrixId,
}

impl<S: State, B: BanditAlgorithm, L: LockStrategy + Default> Tree<S, B, L> {
    /// Tree holding a single unexpanded root.
    pub fn new() -> Self {
        Self::with_locking(L::default())
    }
}

impl<S: State, B: BanditAlgorithm, L: LockStrategy + Default> Default for Tree<S, B, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, B: BanditAlgorithm, L: LockStrategy> Tree<S, B, L> {
    pub fn with_locking(locking: L) -> Self {
        let matrix = Arena::new();
        let root = MatrixId::new(matrix.push(MatrixNode::new(None)));
        Tree { matrix, chance: Arena::new(), locking, root }
    }

    pub fn root(&self) -> MatrixId {
        self.root
    }

    pub fn locking(&self) -> &L {
        &self.locking
    }

    /// Get a matrix node by id.
    pub fn matrix(&self, id: MatrixId) -> &MatrixOf<S, B, L> {
        self.matrix.get(id.index()).expect("invalid matrix node id")
    }

    /// Get a chance node by id.
    pub fn chance(&self, id: ChanceId) -> &ChanceOf<S, B> {
        self.chance.get(id.index()).expect("invalid chance node id")
    }

    /// Number of matrix nodes created so far.
    pub fn matrix_count(&self) -> usize {
        self.matrix.len()
    }

    /// Number of chance nodes created so far.
    pub fn chance_count(&self) -> usize {
        self.chance.len()
    }

    /// Expand a node once. `seed` initializes its stats and runs with the
    /// node locked. Returns false if another caller expanded it first.
    pub fn expand<F>(
        &self,
        id: MatrixId,
        row_actions: Vec<S::Action>,
        col_actions: Vec<S::Action>,
        terminal: bool,
        seed: F,
    ) -> bool
    where
        F: FnOnce(&mut B::MatrixStats),
    {
        let node = self.matrix(id);
        let _guard = self.locking.lock(&node.lock);
        if node.is_expanded() {
            return false;
        }
        if node.expansion.set(Expansion::new(row_actions, col_actions)).is_err() {
            unreachable!("expansion of {:?} set without the expanded flag", id);
        }
        // SAFETY: the node's lock is held until the end of this scope.
        seed(unsafe { node.stats.get_mut() });
        node.mark_expanded(terminal);
        true
    }

    /// Run `f` on a node's stats with the node locked.
    pub fn with_stats<T, F>(&self, id: MatrixId, f: F) -> T
    where
        F: FnOnce(&mut B::MatrixStats) -> T,
    {
        let node = self.matrix(id);
        let _guard = self.locking.lock(&node.lock);
        // SAFETY: the node's lock is held until the end of this scope.
        f(unsafe { node.stats.get_mut() })
    }

    /// Run `f` on a node's stats and one of its chance children's stats,
    /// with the node locked.
    pub fn with_stats_and_chance<T, F>(&self, id: MatrixId, chance: ChanceId, f: F) -> T
    where
        F: FnOnce(&mut B::MatrixStats, &mut B::ChanceStats) -> T,
    {
        let node = self.matrix(id);
        let chance_node = self.chance(chance);
        assert_eq!(chance_node.parent(), id, "chance node belongs to another matrix node");
        let _guard = self.locking.lock(&node.lock);
        // SAFETY: chance stats are guarded by the parent matrix node's lock,
        // which is held until the end of this scope.
        unsafe { f(node.stats.get_mut(), chance_node.stats.get_mut()) }
    }

    /// Chance child for a joint action, created on first access.
    pub fn access_chance(&self, id: MatrixId, row_idx: usize, col_idx: usize) -> ChanceId {
        let expansion = self
            .matrix(id)
            .expansion
            .get()
            .expect("cannot descend from an unexpanded node");
        let cols = expansion.col_actions.len();
        assert!(
            row_idx < expansion.row_actions.len() && col_idx < cols,
            "joint action ({}, {}) out of range",
            row_idx,
            col_idx
        );
        *expansion.children[row_idx * cols + col_idx]
            .get_or_init(|| ChanceId::new(self.chance.push(ChanceNode::new(id, row_idx, col_idx))))
    }

    /// Matrix child for an observation, created on first access.
    pub fn access_matrix(&self, id: ChanceId, observation: &S::Observation) -> MatrixId {
        let chance = self.chance(id);
        if let Some(&child) = chance
            .children
            .read()
            .expect("chance node lock poisoned")
            .get(observation)
        {
            return child;
        }
        let mut children = chance.children.write().expect("chance node lock poisoned");
        match children.entry(observation.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let child = MatrixId::new(self.matrix.push(MatrixNode::new(Some(id))));
                *entry.insert(child)
            }
        }
    }

    /// Visit count of a node as reported by the bandit.
    pub fn visits(&self, bandit: &B, id: MatrixId) -> u64 {
        self.with_stats(id, |stats| bandit.visits(stats))
    }

    /// Number of matrix nodes reachable from the root.
    pub fn reachable_matrix_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            count += 1;
            for (_, _, chance) in self.matrix(id).children() {
                stack.extend(self.chance(chance).children().into_iter().map(|(_, child)| child));
            }
        }
        count
    }

    /// Walk the whole tree and check its structural invariants.
    ///
    /// Meant for quiescent trees; while workers are running, nodes may be
    /// allocated but not linked yet.
    pub fn verify(&self) -> Result<TreeSummary, IntegrityError> {
        let allocated = self.matrix.len();
        let mut seen = HashSet::new();
        let mut summary = TreeSummary::default();

        let root = self.matrix.get(self.root.index()).ok_or(IntegrityError::MissingMatrix(self.root))?;
        if root.parent().is_some() {
            return Err(IntegrityError::MatrixParent {
                child: self.root,
                expected: None,
                found: root.parent(),
            });
        }

        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                return Err(IntegrityError::SharedMatrix(id));
            }
            let node = self.matrix.get(id.index()).ok_or(IntegrityError::MissingMatrix(id))?;
            summary.matrix_nodes += 1;
            summary.max_depth = summary.max_depth.max(depth);

            let children = node.children();
            if node.is_terminal() {
                summary.terminal_nodes += 1;
                if !node.is_expanded() {
                    return Err(IntegrityError::TerminalNotExpanded(id));
                }
                if !children.is_empty() {
                    return Err(IntegrityError::TerminalWithChildren(id));
                }
            }
            if node.is_expanded() {
                summary.expanded_nodes += 1;
            } else if !children.is_empty() {
                return Err(IntegrityError::ExpansionFlag(id));
            }

            for (slot_row, slot_col, chance_id) in children {
                let chance = self
                    .chance
                    .get(chance_id.index())
                    .ok_or(IntegrityError::MissingChance(chance_id))?;
                summary.chance_nodes += 1;
                if chance.parent() != id {
                    return Err(IntegrityError::ChanceParent {
                        child: chance_id,
                        expected: id,
                        found: chance.parent(),
                    });
                }
                if (chance.row_idx(), chance.col_idx()) != (slot_row, slot_col) {
                    return Err(IntegrityError::ChanceSlot {
                        child: chance_id,
                        row_idx: chance.row_idx(),
                        col_idx: chance.col_idx(),
                        slot_row,
                        slot_col,
                    });
                }
                for (_, child_id) in chance.children() {
                    let child = self
                        .matrix
                        .get(child_id.index())
                        .ok_or(IntegrityError::MissingMatrix(child_id))?;
                    if child.parent() != Some(chance_id) {
                        return Err(IntegrityError::MatrixParent {
                            child: child_id,
                            expected: Some(chance_id),
                            found: child.parent(),
                        });
                    }
                    stack.push((child_id, depth + 1));
                }
            }
        }

        if summary.matrix_nodes != allocated {
            return Err(IntegrityError::Unreachable {
                allocated,
                reachable: summary.matrix_nodes,
            });
        }
        Ok(summary)
    }
}
