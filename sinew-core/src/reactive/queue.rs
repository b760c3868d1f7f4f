//! Change Queue
//!
//! Every intercepted write produces a [`Change`]. Changes are consumed in the
//! order they were enqueued; the flush loop drains the queue until it is
//! empty, so changes enqueued while a flush runs are handled by that same
//! flush.
//!
//! The queue numbers every change it accepts. A hook registered after change
//! `n` was queued was built from state that already includes it, so the flush
//! skips that hook for changes up to `n`.

use std::collections::VecDeque;

use super::object::Object;
use super::value::{Key, Value};

/// A pending write.
#[derive(Debug, Clone)]
pub struct Change {
    /// The key that was written.
    pub key: Key,

    /// The value carried by the write.
    pub value: Value,

    /// The object that was written to.
    pub receiver: Object,

    /// Assigned by [`ChangeQueue::push`], starting at 1.
    pub sequence: u64,
}

impl Change {
    pub fn new(key: Key, value: Value, receiver: Object) -> Self {
        Self {
            key,
            value,
            receiver,
            sequence: 0,
        }
    }
}

/// FIFO queue of pending writes.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    pending: VecDeque<Change>,
    issued: u64,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut change: Change) {
        self.issued += 1;
        change.sequence = self.issued;
        self.pending.push_back(change);
    }

    /// Sequence number of the most recently queued change, or 0.
    pub fn last_sequence(&self) -> u64 {
        self.issued
    }

    pub fn pop(&mut self) -> Option<Change> {
        self.pending.pop_front()
    }

    /// Drop every pending change, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
