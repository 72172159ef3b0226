//! Linear undo/redo history of immutable states
//!
//! States are held as `Arc<T>` so a host can keep a cheap handle to any
//! snapshot while the history moves on.

use std::sync::Arc;

/// Default number of undo steps kept
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Sequence of states with a cursor
///
/// `entries[cursor]` is the current state. Pushing while the cursor is not
/// at the end discards the redo branch. Only the newest `max_depth + 1`
/// states are kept.
#[derive(Debug, Clone)]
pub struct UndoRedoHistory<T> {
    entries: Vec<Arc<T>>,
    cursor: usize,
    max_depth: usize,
}

impl<T> UndoRedoHistory<T> {
    pub fn new(initial: T) -> Self {
        Self::with_max_depth(initial, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(initial: T, max_depth: usize) -> Self {
        Self {
            entries: vec![Arc::new(initial)],
            cursor: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// The current state
    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    /// A shared handle to the current state
    pub fn current_arc(&self) -> Arc<T> {
        Arc::clone(&self.entries[self.cursor])
    }

    /// Record a new state after the cursor, discarding any redo branch
    pub fn push(&mut self, state: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(Arc::new(state));
        self.cursor = self.entries.len() - 1;

        // Limit history size
        if self.entries.len() > self.max_depth + 1 {
            let excess = self.entries.len() - (self.max_depth + 1);
            self.entries.drain(..excess);
            self.cursor -= excess;
        }
    }

    /// Replace the current state without creating a history step
    pub fn replace_current(&mut self, state: T) {
        self.entries[self.cursor] = Arc::new(state);
    }

    /// Step back. Returns the new current state, or `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Step forward. Returns the new current state, or `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Number of stored states (always at least one)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_walks_the_cursor() {
        let mut history = UndoRedoHistory::new(0);
        history.push(1);
        history.push(2);
        history.push(3);

        assert_eq!(history.undo(), Some(&2));
        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.undo(), Some(&0));
        assert_eq!(history.undo(), None);
        assert!(!history.can_undo());

        assert_eq!(history.redo(), Some(&1));
        assert_eq!(history.redo(), Some(&2));
        assert_eq!(history.redo(), Some(&3));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn push_discards_redo_branch() {
        let mut history = UndoRedoHistory::new("a");
        history.push("b");
        history.push("c");
        history.undo();
        history.undo();
        history.push("d");
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(*history.current(), "d");
        assert_eq!(history.undo(), Some(&"a"));
    }

    #[test]
    fn depth_is_bounded() {
        let mut history = UndoRedoHistory::with_max_depth(0, 3);
        for i in 1..=10 {
            history.push(i);
        }
        assert_eq!(history.len(), 4);
        assert_eq!(*history.current(), 10);
        let mut oldest = 10;
        while let Some(v) = history.undo() {
            oldest = *v;
        }
        assert_eq!(oldest, 7);
    }

    #[test]
    fn replace_current_is_not_a_step() {
        let mut history = UndoRedoHistory::new(1);
        history.push(2);
        history.replace_current(20);
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.redo(), Some(&20));
    }
}
