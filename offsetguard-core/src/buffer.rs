//! Fixed-Capacity Ring Buffer for Bounded Learning Histories
//!
//! ## Overview
//!
//! Every history the core keeps (outlier windows, hysteresis transitions,
//! probe results, seasonal patterns, offset samples) has a hard cap. This
//! module provides the single ring buffer they all share. Capacity is a
//! compile-time constant, so a device's learned state has a fixed size no
//! matter how long it runs.
//!
//! ## Behaviour
//!
//! - O(1) insertion, overwriting the oldest entry when full
//! - O(1) access to the most recent entry
//! - Iteration always runs oldest to newest
//! - `retain` rebuilds the ring in order, used for age pruning
//!
//! ### Memory Layout
//!
//! Storage is a `heapless::Deque`, a ring whose contents may wrap around the
//! end of its array. Logical order is the front slice then the back slice:
//!
//! ```text
//! RingBuffer<f32, 5> after 7 pushes (values 0..7):
//! ┌─────┬─────┬─────┬─────┬─────┐
//! │  5  │  6  │  2  │  3  │  4  │  ← physical slots
//! └─────┴─────┴─────┴─────┴─────┘
//!   back slice   front slice
//! Logical view: [2, 3, 4, 5, 6]
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use offsetguard_core::buffer::RingBuffer;
//!
//! let mut starts: RingBuffer<f32, 3> = RingBuffer::new();
//! for temp in [24.0, 24.2, 24.4, 24.1] {
//!     starts.push(temp);
//! }
//!
//! // Oldest reading was evicted
//! let kept: Vec<f32> = starts.iter().copied().collect();
//! assert_eq!(kept, vec![24.2, 24.4, 24.1]);
//! ```

use alloc::vec::Vec;
use core::{iter::Chain, slice};

use heapless::Deque;

/// Fixed-capacity ring buffer
///
/// Logical index 0 is always the oldest entry. Not thread-safe; each device
/// owns its histories exclusively.
#[derive(Debug, Clone)]
pub struct RingBuffer<T: Copy, const N: usize> {
    items: Deque<T, N>,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new empty ring buffer
    pub const fn new() -> Self {
        Self { items: Deque::new() }
    }

    /// Adds an entry, overwriting the oldest one when full
    pub fn push(&mut self, item: T) {
        if N == 0 {
            return;
        }
        if self.items.is_full() {
            self.items.pop_front();
        }
        // Cannot fail: a slot was freed above
        let _ = self.items.push_back(item);
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maximum number of entries
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest entry
    pub fn first(&self) -> Option<&T> {
        self.items.front()
    }

    /// Entry by logical index (0 = oldest, len-1 = newest)
    pub fn get(&self, index: usize) -> Option<&T> {
        let (front, back) = self.items.as_slices();
        if index < front.len() {
            front.get(index)
        } else {
            back.get(index - front.len())
        }
    }

    /// Iterate over entries from oldest to newest
    pub fn iter(&self) -> RingBufferIter<'_, T> {
        let (front, back) = self.items.as_slices();
        RingBufferIter {
            inner: front.iter().chain(back.iter()),
        }
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Keep only entries matching `keep`, preserving order
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut keep: F) {
        let mut kept = Self::new();
        for item in self.iter() {
            if keep(item) {
                kept.push(*item);
            }
        }
        *self = kept;
    }

    /// Copy entries out, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }

    /// Rebuild from a sequence, keeping the newest `N` entries
    pub fn from_slice(items: &[T]) -> Self {
        let mut ring = Self::new();
        let skip = items.len().saturating_sub(N);
        for item in &items[skip..] {
            ring.push(*item);
        }
        ring
    }
}

impl<T: Copy + PartialEq, const N: usize> PartialEq for RingBuffer<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over ring buffer contents, oldest first
pub struct RingBufferIter<'a, T> {
    inner: Chain<slice::Iter<'a, T>, slice::Iter<'a, T>>,
}

impl<'a, T> Iterator for RingBufferIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T> DoubleEndedIterator for RingBufferIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn empty_buffer() {
        let buffer: RingBuffer<f32, 5> = RingBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert!(buffer.first().is_none());
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = RingBuffer::<u32, 3>::new();

        for i in 0..5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());
        assert_eq!(buffer.to_vec(), vec![2, 3, 4]);
        assert_eq!(buffer.last(), Some(&4));
        assert_eq!(buffer.first(), Some(&2));
    }

    #[test]
    fn retain_preserves_order() {
        let mut buffer = RingBuffer::<u32, 4>::new();
        for i in 0..6 {
            buffer.push(i);
        }

        buffer.retain(|v| v % 2 == 0);
        assert_eq!(buffer.to_vec(), vec![2, 4]);

        // Ring keeps working after a rebuild
        buffer.push(10);
        buffer.push(12);
        buffer.push(14);
        assert_eq!(buffer.to_vec(), vec![4, 10, 12, 14]);
    }

    #[test]
    fn from_slice_keeps_newest() {
        let buffer = RingBuffer::<u32, 3>::from_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(buffer.to_vec(), vec![3, 4, 5]);

        let short = RingBuffer::<u32, 3>::from_slice(&[7]);
        assert_eq!(short.to_vec(), vec![7]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buffer = RingBuffer::<f32, 50>::new();
        for i in 0..1000 {
            buffer.push(i as f32);
            assert!(buffer.len() <= buffer.capacity());
        }
        assert_eq!(buffer.iter().count(), 50);
    }

    #[test]
    fn indexing_follows_wraparound() {
        let mut buffer = RingBuffer::<u32, 4>::new();
        for i in 0..7 {
            buffer.push(i);
        }

        let indexed: Vec<u32> = (0..buffer.len()).filter_map(|i| buffer.get(i).copied()).collect();
        assert_eq!(indexed, vec![3, 4, 5, 6]);
        assert_eq!(buffer.get(4), None);
        assert_eq!(buffer.iter().rev().next(), Some(&6));
    }
}
