//! Fixed-capacity circular sequence with absolute monotonic positions.
//!
//! Mirrors the sample ring used for KPI tracking elsewhere in this codebase,
//! generalized to an arbitrary item type and guarded by a read/write lock
//! instead of a plain mutex so concurrent readers never block each other.

use std::sync::RwLock;

use otel_snap_core::error::{Error, Result};

struct Inner<T> {
    buf: Vec<T>,
    /// Next write slot, modulo capacity.
    head: usize,
    /// Current live count, saturating at capacity.
    size: usize,
    /// Monotonic count of all items ever added.
    total_written: u64,
    capacity: usize,
}

impl<T: Clone> Inner<T> {
    fn add(&mut self, item: T) {
        if self.buf.len() < self.capacity {
            self.buf.push(item);
        } else {
            self.buf[self.head] = item;
        }
        self.head = (self.head + 1) % self.capacity;
        self.size = self.size.saturating_add(1).min(self.capacity);
        self.total_written += 1;
    }

    /// Lower bound of the live position range (inclusive).
    fn live_floor(&self) -> u64 {
        self.total_written.saturating_sub(self.size as u64)
    }

    fn get_all(&self) -> Vec<T> {
        if self.size == 0 {
            return Vec::new();
        }
        if self.buf.len() < self.capacity {
            // Never wrapped: slots [0, size).
            self.buf[..self.size].to_vec()
        } else {
            // Wrapped: [head, capacity) ++ [0, head).
            let mut out = Vec::with_capacity(self.capacity);
            out.extend_from_slice(&self.buf[self.head..]);
            out.extend_from_slice(&self.buf[..self.head]);
            out
        }
    }

    fn get_recent(&self, n: usize) -> Vec<T> {
        let all = self.get_all();
        if n >= all.len() {
            return all;
        }
        all[all.len() - n..].to_vec()
    }

    fn get_range(&self, start: i64, end: i64) -> Vec<T> {
        if self.size == 0 || start < 0 || end < start {
            return Vec::new();
        }
        let floor = self.live_floor() as i64;
        let ceiling = self.total_written as i64 - 1;
        let clamped_start = start.max(floor);
        let clamped_end = end.min(ceiling);
        if clamped_start > clamped_end {
            return Vec::new();
        }
        let all = self.get_all();
        let mut out = Vec::with_capacity((clamped_end - clamped_start + 1) as usize);
        for pos in clamped_start..=clamped_end {
            let offset = (pos - floor) as usize;
            out.push(all[offset].clone());
        }
        out
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
        self.size = 0;
        self.total_written = 0;
    }
}

/// Thread-safe fixed-capacity FIFO with absolute, monotonic logical positions.
///
/// The slot holding position `p` (while still live) is `items[p % capacity]`.
/// An item is live iff `max(total_written - size, 0) <= p < total_written`.
pub struct RingSequence<T> {
    inner: RwLock<Inner<T>>,
    capacity: usize,
}

impl<T: Clone> RingSequence<T> {
    /// Construct a new ring. `capacity` must be greater than zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        Ok(Self {
            inner: RwLock::new(Inner {
                buf: Vec::with_capacity(capacity),
                head: 0,
                size: 0,
                total_written: 0,
                capacity,
            }),
            capacity,
        })
    }

    pub fn add(&self, item: T) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.add(item);
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).size
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn get_all(&self) -> Vec<T> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).get_all()
    }

    #[must_use]
    pub fn get_recent(&self, n: usize) -> Vec<T> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).get_recent(n)
    }

    /// Inclusive range `[start, end]`, clamped to the live window.
    #[must_use]
    pub fn get_range(&self, start: i64, end: i64) -> Vec<T> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).get_range(start, end)
    }

    /// The position the next appended item will occupy.
    #[must_use]
    pub fn current_position(&self) -> u64 {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).total_written
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(RingSequence::<i32>::new(0).is_err());
    }

    #[test]
    fn wrap_scenario_from_design_doc() {
        let ring = RingSequence::new(3).unwrap();
        ring.add(1);
        ring.add(2);
        ring.add(3);
        ring.add(4);
        assert_eq!(ring.size(), 3);
        assert_eq!(ring.get_all(), vec![2, 3, 4]);
        assert_eq!(ring.current_position(), 4);
        // Position 0 was evicted; GetRange(0, 3) clamps it away.
        assert_eq!(ring.get_range(0, 3), vec![2, 3, 4]);
    }

    #[test]
    fn get_range_empty_when_size_zero() {
        let ring = RingSequence::<i32>::new(4).unwrap();
        assert_eq!(ring.get_range(0, 10), Vec::<i32>::new());
    }

    #[test]
    fn get_range_rejects_negative_start_and_inverted_bounds() {
        let ring = RingSequence::new(4).unwrap();
        ring.add(1);
        ring.add(2);
        assert_eq!(ring.get_range(-1, 1), Vec::<i32>::new());
        assert_eq!(ring.get_range(1, 0), Vec::<i32>::new());
    }

    #[test]
    fn get_recent_caps_at_size() {
        let ring = RingSequence::new(10).unwrap();
        for i in 0..5 {
            ring.add(i);
        }
        assert_eq!(ring.get_recent(2), vec![3, 4]);
        assert_eq!(ring.get_recent(100), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clear_resets_everything() {
        let ring = RingSequence::new(4).unwrap();
        ring.add(1);
        ring.add(2);
        ring.clear();
        assert_eq!(ring.size(), 0);
        assert_eq!(ring.current_position(), 0);
        assert!(ring.get_all().is_empty());
    }

    #[test]
    fn after_m_additions_first_c_of_get_all_are_most_recent_c() {
        let capacity = 5usize;
        let ring = RingSequence::new(capacity).unwrap();
        let m = 17u64;
        for i in 0..m {
            ring.add(i);
        }
        let evicted = m - capacity as u64;
        assert_eq!(ring.current_position(), m);
        let all = ring.get_all();
        assert_eq!(all.len(), capacity);
        assert_eq!(all, (evicted..m).collect::<Vec<_>>());
    }
}
