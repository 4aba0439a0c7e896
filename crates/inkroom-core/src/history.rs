//! Bounded undo/redo stacks of full snapshots.

use std::collections::VecDeque;

/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Two-stack history. Committing clears the redo stack; once `past` exceeds
/// the limit the oldest snapshot is dropped.
#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<T>,
    future: Vec<T>,
    limit: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl<T> History<T> {
    /// A history keeping at most `limit` undo states (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the state before a mutation.
    pub fn record(&mut self, before: T) {
        self.past.push_back(before);
        self.future.clear();
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
    }

    /// Step back. `current` moves onto the redo stack and the previous state
    /// is returned, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.past.pop_back()?;
        self.future.push(current);
        Some(previous)
    }

    /// Step forward, mirroring [`History::undo`].
    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop()?;
        self.past.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
