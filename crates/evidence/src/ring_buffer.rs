//! Fixed-capacity FIFO of recent frames.

use std::collections::VecDeque;

/// Keeps the most recent `capacity` items, evicting the oldest first.
#[derive(Debug, Clone)]
pub struct FrameRingBuffer<T> {
    frames: VecDeque<T>,
    capacity: usize,
}

impl<T> FrameRingBuffer<T> {
    /// Capacity below 1 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame, returning the evicted one when full.
    pub fn push(&mut self, frame: T) -> Option<T> {
        let evicted = if self.frames.len() == self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Up to `k` most recent frames, oldest first.
    pub fn latest(&self, k: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.frames.len().saturating_sub(k);
        self.frames.iter().skip(skip)
    }

    /// All frames, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
