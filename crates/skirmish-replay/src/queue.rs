//! FIFO of event batches awaiting replay.

use std::collections::VecDeque;

/// Ordered queue of batches. Insertion order is replay order.
///
/// Unbounded, but the high-water mark is tracked so the buffering
/// behaviour can be observed.
#[derive(Debug)]
pub struct EventQueue<B> {
    batches: VecDeque<B>,
    high_water: usize,
}

impl<B> Default for EventQueue<B> {
    fn default() -> Self {
        Self {
            batches: VecDeque::new(),
            high_water: 0,
        }
    }
}

impl<B> EventQueue<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append batches, preserving their order.
    pub fn extend(&mut self, batches: impl IntoIterator<Item = B>) {
        self.batches.extend(batches);
        self.high_water = self.high_water.max(self.batches.len());
    }

    /// Take the oldest batch.
    pub fn pop(&mut self) -> Option<B> {
        self.batches.pop_front()
    }

    /// Drop everything queued, returning how many batches were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.batches.len();
        self.batches.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Largest length the queue has reached.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}
