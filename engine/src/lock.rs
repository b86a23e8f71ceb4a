//! Locking strategies guarding per-node statistics.
//!
//! Every matrix node carries a [`LockStrategy::Handle`]. Locking a node means
//! turning its handle into a guard on some mutex: either one embedded in the
//! node ([`PerNodeLock`]) or one slot of a shared pool ([`PooledLock`]).
//! A node's chance children are guarded by the same lock as the node itself.

use crate::error::SearchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Default number of mutexes in a [`PooledLock`].
pub const DEFAULT_POOL_SIZE: usize = 128;

/// How a node's handle is mapped to a mutex.
pub trait LockStrategy: Send + Sync {
    /// Per-node lock state stored in every matrix node.
    type Handle: Default + Send + Sync;

    fn lock<'a>(&'a self, handle: &'a Self::Handle) -> MutexGuard<'a, ()>;
}

fn acquire(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    // A panic while holding a node lock leaves the tree half-updated.
    mutex.lock().expect("search tree lock poisoned")
}

/// One mutex embedded in every node.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerNodeLock;

impl LockStrategy for PerNodeLock {
    type Handle = Mutex<()>;

    fn lock<'a>(&'a self, handle: &'a Mutex<()>) -> MutexGuard<'a, ()> {
        acquire(handle)
    }
}

/// Fixed pool of mutexes shared by all nodes.
///
/// A node takes a slot the first time it is locked (its expansion), handed
/// out round-robin. Unrelated nodes may share a slot; they then serialize on
/// the same mutex.
#[derive(Debug)]
pub struct PooledLock {
    pool: Box<[Mutex<()>]>,
    next: AtomicUsize,
}

impl PooledLock {
    pub fn new(size: usize) -> Result<Self, SearchError> {
        if size == 0 {
            return Err(SearchError::EmptyLockPool);
        }
        Ok(PooledLock {
            pool: (0..size).map(|_| Mutex::new(())).collect(),
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.pool.len()
    }

    /// Slot assigned to `handle`, if the node has been locked before.
    pub fn slot(handle: &OnceLock<usize>) -> Option<usize> {
        handle.get().copied()
    }

    /// Number of slots handed out so far, including wrap-arounds.
    pub fn assigned(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for PooledLock {
    fn default() -> Self {
        PooledLock {
            pool: (0..DEFAULT_POOL_SIZE).map(|_| Mutex::new(())).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl LockStrategy for PooledLock {
    type Handle = OnceLock<usize>;

    fn lock<'a>(&'a self, handle: &'a OnceLock<usize>) -> MutexGuard<'a, ()> {
        let slot = *handle.get_or_init(|| self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len());
        acquire(&self.pool[slot])
    }
}
