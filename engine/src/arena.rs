//! Append-only node storage shared across worker threads.
//!
//! Nodes live in a flat array addressed by integer index, like a `Vec`, but
//! the array grows in geometrically sized segments that never move. A
//! reference returned by [`Arena::get`] therefore stays valid while other
//! threads keep pushing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// log2 of the first segment's capacity.
const BASE_BITS: u32 = 6;
const BASE: usize = 1 << BASE_BITS;
/// Enough segments to address every `u32` index.
const SEGMENTS: usize = 27;

/// Concurrent, append-only array.
pub struct Arena<T> {
    segments: Box<[OnceLock<Box<[OnceLock<T>]>>]>,
    len: AtomicUsize,
}

/// Segment number and offset of an index. Segment `k` holds `64 << k` slots.
fn locate(index: usize) -> (usize, usize) {
    let i = index + BASE;
    let bits = usize::BITS - 1 - i.leading_zeros();
    let segment = (bits - BASE_BITS) as usize;
    (segment, i - (1 << bits))
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            segments: (0..SEGMENTS).map(|_| OnceLock::new()).collect(),
            len: AtomicUsize::new(0),
        }
    }

    /// Store `value` and return its index.
    pub fn push(&self, value: T) -> usize {
        let index = self.len.fetch_add(1, Ordering::AcqRel);
        assert!(index <= u32::MAX as usize, "arena is full");
        let (segment, offset) = locate(index);
        let slots = self.segments[segment]
            .get_or_init(|| (0..BASE << segment).map(|_| OnceLock::new()).collect());
        if slots[offset].set(value).is_err() {
            unreachable!("arena slot {} written twice", index);
        }
        index
    }

    /// Get the value at `index`, if it has been pushed.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        let (segment, offset) = locate(index);
        self.segments[segment].get()?.get(offset)?.get()
    }

    /// Number of indices handed out so far.
    ///
    /// While pushes are in flight some of these slots may still be empty.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored values in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index).map(|value| (index, value)))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_locate_segment_boundaries() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(63), (0, 63));
        assert_eq!(locate(64), (1, 0));
        assert_eq!(locate(191), (1, 127));
        assert_eq!(locate(192), (2, 0));
        let (segment, _) = locate(u32::MAX as usize);
        assert!(segment < SEGMENTS);
    }

    #[test]
    fn test_push_and_get() {
        let arena = Arena::new();
        for i in 0..1_000u32 {
            assert_eq!(arena.push(i), i as usize);
        }
        assert_eq!(arena.len(), 1_000);
        assert_eq!(arena.get(0), Some(&0));
        assert_eq!(arena.get(777), Some(&777));
        assert_eq!(arena.get(1_000), None);
        assert_eq!(arena.iter().count(), 1_000);
    }

    #[test]
    fn test_references_survive_growth() {
        let arena = Arena::new();
        arena.push(String::from("first"));
        let first = arena.get(0).expect("pushed");
        for i in 0..5_000 {
            arena.push(i.to_string());
        }
        assert_eq!(first, "first");
    }

    #[test]
    fn test_concurrent_push() {
        let arena = Arc::new(Arena::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let arena = Arc::clone(&arena);
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        arena.push(t * 1_000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert_eq!(arena.len(), 8_000);
        let mut values: Vec<usize> = arena.iter().map(|(_, v)| *v).collect();
        values.sort_unstable();
        assert_eq!(values, (0..8_000).collect::<Vec<_>>());
    }
}
