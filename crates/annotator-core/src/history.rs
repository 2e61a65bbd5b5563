//! Bounded undo history of full element-list snapshots
//!
//! A snapshot is taken right before a gesture or command mutates the store,
//! never during pointer movement. Snapshots are owned clones, so later edits
//! to the live list cannot reach them.

use crate::element::PlacedElement;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    entries: VecDeque<Vec<PlacedElement>>,
    /// Entry pushed out by the latest snapshot, kept until that snapshot
    /// is either discarded or superseded
    evicted: Option<Vec<PlacedElement>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
            evicted: None,
        }
    }

    /// Push a copy of `elements`, evicting the oldest entry when full
    pub fn snapshot(&mut self, elements: &[PlacedElement]) {
        self.evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(elements.to_vec());
    }

    /// Pop the most recent snapshot. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Vec<PlacedElement>> {
        self.evicted = None;
        self.entries.pop_back()
    }

    /// Drop the most recent snapshot without restoring it and bring back
    /// the entry it evicted. Used when a gesture turns out to change nothing.
    pub(crate) fn discard_last(&mut self) {
        if self.entries.pop_back().is_some() {
            if let Some(evicted) = self.evicted.take() {
                self.entries.push_front(evicted);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.evicted = None;
        self.entries.clear();
    }
}
