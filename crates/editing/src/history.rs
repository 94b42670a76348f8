//! Bounded undo/redo history of timeline snapshots.
//!
//! History is a single ordered list of snapshots plus a cursor pointing at
//! the snapshot that matches the live timeline. The list is seeded with the
//! initial state, so `undo` is possible as soon as one edit has been pushed.
//!
//! - Pushing while the cursor is not at the top discards the redo branch.
//! - When full, the oldest snapshot is evicted.
//! - `undo`/`redo` at either end report [`HistoryStep::AtBoundary`] and do
//!   nothing else.

use montage_project_model::TimelineState;

/// A snapshot plus the label of the edit that produced it.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub label: String,
    pub state: TimelineState,
}

/// Result of an undo or redo request.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryStep {
    /// The cursor moved; this is a deep copy of the snapshot to restore.
    Restored(TimelineState),
    /// Nothing further in that direction.
    AtBoundary,
}

pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    max_entries: usize,
}

impl History {
    /// Start a history at `initial`, holding at most `max_entries` snapshots
    /// (at least two, so one edit can always be undone).
    pub fn new(initial: TimelineState, max_entries: usize) -> Self {
        Self {
            entries: vec![HistoryEntry {
                label: "Initial".to_string(),
                state: initial,
            }],
            cursor: 0,
            max_entries: max_entries.max(2),
        }
    }

    /// Record the state produced by an edit.
    pub fn push(&mut self, label: &str, state: TimelineState) {
        let discarded = self.entries.len() - (self.cursor + 1);
        self.entries.truncate(self.cursor + 1);

        self.entries.push(HistoryEntry {
            label: label.to_string(),
            state,
        });

        let mut evicted = 0;
        while self.entries.len() > self.max_entries {
            self.entries.remove(0);
            evicted += 1;
        }
        self.cursor = self.entries.len() - 1;

        tracing::debug!(
            label,
            depth = self.entries.len(),
            discarded,
            evicted,
            "History entry pushed"
        );
    }

    pub fn undo(&mut self) -> HistoryStep {
        if self.cursor == 0 {
            tracing::debug!("Undo at oldest entry");
            return HistoryStep::AtBoundary;
        }
        let undone = &self.entries[self.cursor].label;
        tracing::debug!(label = %undone, cursor = self.cursor - 1, "Undo");
        self.cursor -= 1;
        HistoryStep::Restored(self.entries[self.cursor].state.clone())
    }

    pub fn redo(&mut self) -> HistoryStep {
        if self.cursor + 1 >= self.entries.len() {
            tracing::debug!("Redo at newest entry");
            return HistoryStep::AtBoundary;
        }
        self.cursor += 1;
        tracing::debug!(
            label = %self.entries[self.cursor].label,
            cursor = self.cursor,
            "Redo"
        );
        HistoryStep::Restored(self.entries[self.cursor].state.clone())
    }

    /// Drop everything and start over at `state`.
    pub fn reset(&mut self, state: TimelineState) {
        self.entries.clear();
        self.entries.push(HistoryEntry {
            label: "Initial".to_string(),
            state,
        });
        self.cursor = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Number of stored snapshots, including the current one.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Snapshot the cursor points at.
    pub fn current(&self) -> &TimelineState {
        &self.entries[self.cursor].state
    }

    /// Label of the edit `undo` would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.can_undo()
            .then(|| self.entries[self.cursor].label.as_str())
    }

    /// Label of the edit `redo` would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        self.can_redo()
            .then(|| self.entries[self.cursor + 1].label.as_str())
    }
}
