use std::collections::HashMap;
use std::sync::Arc;

use super::history::UndoRedoHistory;
use super::reducers;
use super::snapshot::MixSnapshot;
use super::track::TrackId;

/// Holds the current mix snapshot and its undo history
///
/// A gesture may show intermediate values with [`preview`](Self::preview)
/// and then record exactly one history step with [`commit`](Self::commit).
#[derive(Debug, Clone)]
pub struct MixStateStore {
    history: UndoRedoHistory<MixSnapshot>,
    preview: Option<MixSnapshot>,
    /// Durations discovered so far, used to re-synthesize default regions
    /// after undo/redo lands on an older snapshot
    durations: HashMap<TrackId, f64>,
}

impl MixStateStore {
    pub fn new(initial: MixSnapshot, max_depth: usize) -> Self {
        Self {
            history: UndoRedoHistory::with_max_depth(initial, max_depth),
            preview: None,
            durations: HashMap::new(),
        }
    }

    /// The snapshot the live graph should reflect
    pub fn current(&self) -> &MixSnapshot {
        self.preview.as_ref().unwrap_or_else(|| self.history.current())
    }

    /// The last committed snapshot
    pub fn committed(&self) -> Arc<MixSnapshot> {
        self.history.current_arc()
    }

    /// Show an uncommitted snapshot
    pub fn preview(&mut self, snapshot: MixSnapshot) {
        self.preview = Some(snapshot);
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    /// Drop the preview. Returns true if one was active.
    pub fn discard_preview(&mut self) -> bool {
        self.preview.take().is_some()
    }

    /// Record a snapshot as one history step. Returns false (and records
    /// nothing) if it equals the committed snapshot.
    pub fn commit(&mut self, snapshot: MixSnapshot) -> bool {
        self.preview = None;
        if &snapshot == self.history.current() {
            return false;
        }
        self.history.push(snapshot);
        true
    }

    /// Commit the active preview, if any
    pub fn commit_preview(&mut self) -> bool {
        match self.preview.take() {
            Some(snapshot) => self.commit(snapshot),
            None => false,
        }
    }

    /// Step back. At the start of history this does nothing, an active
    /// preview included.
    pub fn undo(&mut self) -> Option<&MixSnapshot> {
        if !self.history.can_undo() {
            return None;
        }
        self.preview = None;
        self.history.undo()?;
        self.apply_known_durations();
        Some(self.history.current())
    }

    pub fn redo(&mut self) -> Option<&MixSnapshot> {
        if !self.history.can_redo() {
            return None;
        }
        self.preview = None;
        self.history.redo()?;
        self.apply_known_durations();
        Some(self.history.current())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Remember a track's duration and give it a default region if it has
    /// none. Amends the current entry instead of adding an undo step.
    /// Returns true if the snapshot changed.
    pub fn record_duration(&mut self, id: &TrackId, duration: f64) -> bool {
        self.durations.insert(id.clone(), duration);

        if let Some(preview) = self.preview.take() {
            self.preview = Some(reducers::ensure_default_region(&preview, id, duration));
        }

        let current = self.history.current();
        let next = reducers::ensure_default_region(current, id, duration);
        if &next == current {
            return false;
        }
        self.history.replace_current(next);
        true
    }

    pub fn known_duration(&self, id: &TrackId) -> Option<f64> {
        self.durations.get(id).copied()
    }

    fn apply_known_durations(&mut self) {
        let mut next = self.history.current().clone();
        for (id, duration) in &self.durations {
            next = reducers::ensure_default_region(&next, id, *duration);
        }
        if &next != self.history.current() {
            self.history.replace_current(next);
        }
    }
}
