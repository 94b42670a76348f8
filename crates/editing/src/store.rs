//! The Timeline Store: sole mutation entry point for timeline state.
//!
//! Every successful edit is followed by exactly one history push. Pointer
//! gestures (drags) apply many intermediate edits against the state captured
//! when the gesture began, and push once when it is committed.

use montage_common::EditorDefaults;
use montage_project_model::{AssetId, EntityId, TimelineState};

use crate::error::EditError;
use crate::history::{History, HistoryStep};
use crate::ops::{apply, EditOp, EditParams};

/// An in-progress gesture: the state it started from and its label.
#[derive(Debug, Clone)]
struct Gesture {
    label: &'static str,
    base: TimelineState,
}

pub struct TimelineStore {
    state: TimelineState,
    history: History,
    params: EditParams,
    gesture: Option<Gesture>,
    /// Bumped on every change of `state`, so readers can detect changes cheaply.
    revision: u64,
}

impl TimelineStore {
    pub fn new(defaults: &EditorDefaults) -> Self {
        Self::with_state(TimelineState::new(), defaults)
    }

    /// Start from a loaded state. History begins at that state.
    pub fn with_state(mut state: TimelineState, defaults: &EditorDefaults) -> Self {
        if state.spread_tied_layers() {
            tracing::debug!("Spread tied layers of loaded timeline");
        }
        Self {
            history: History::new(state.clone(), defaults.effective_history_limit()),
            state,
            params: EditParams::from(defaults),
            gesture: None,
            revision: 0,
        }
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn params(&self) -> &EditParams {
        &self.params
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn in_gesture(&self) -> bool {
        self.gesture.is_some()
    }

    /// Apply one edit and record it.
    pub fn execute(&mut self, op: EditOp) -> Result<(), EditError> {
        if self.gesture.is_some() {
            self.commit_gesture();
        }
        match apply(&self.state, &op, &self.params) {
            Ok(next) => {
                tracing::info!(
                    edit = op.label(),
                    target = ?op.target(),
                    duration = next.duration,
                    "Edit applied"
                );
                self.set_state(next);
                self.history.push(op.label(), self.state.clone());
                Ok(())
            }
            Err(err) => {
                if err.is_noop() {
                    tracing::debug!(edit = op.label(), "Edit had no effect");
                } else {
                    tracing::warn!(edit = op.label(), error = %err, "Edit rejected");
                }
                Err(err)
            }
        }
    }

    /// Begin a gesture. Any gesture still open is committed first.
    pub fn begin_gesture(&mut self, label: &'static str) {
        if self.gesture.is_some() {
            self.commit_gesture();
        }
        tracing::debug!(label, "Gesture started");
        self.gesture = Some(Gesture {
            label,
            base: self.state.clone(),
        });
    }

    /// Replace the gesture's provisional result with `op` applied to the
    /// state the gesture started from. Nothing is pushed to history.
    pub fn update_gesture(&mut self, op: &EditOp) -> Result<(), EditError> {
        let Some(gesture) = &self.gesture else {
            return self.execute(op.clone());
        };
        let next = match apply(&gesture.base, op, &self.params) {
            Ok(next) => next,
            Err(EditError::NoOp) => gesture.base.clone(),
            Err(err) => return Err(err),
        };
        if next != self.state {
            self.set_state(next);
        }
        Ok(())
    }

    /// Finish the gesture, pushing one history entry if anything changed.
    /// Returns whether an entry was pushed.
    pub fn commit_gesture(&mut self) -> bool {
        let Some(gesture) = self.gesture.take() else {
            return false;
        };
        if gesture.base == self.state {
            tracing::debug!(label = gesture.label, "Gesture ended without changes");
            return false;
        }
        tracing::info!(label = gesture.label, duration = self.state.duration, "Gesture committed");
        self.history.push(gesture.label, self.state.clone());
        true
    }

    pub fn undo(&mut self) -> Result<(), EditError> {
        self.commit_gesture();
        match self.history.undo() {
            HistoryStep::Restored(state) => {
                self.set_state(state);
                Ok(())
            }
            HistoryStep::AtBoundary => Err(EditError::AtBoundary("start")),
        }
    }

    pub fn redo(&mut self) -> Result<(), EditError> {
        self.commit_gesture();
        match self.history.redo() {
            HistoryStep::Restored(state) => {
                self.set_state(state);
                Ok(())
            }
            HistoryStep::AtBoundary => Err(EditError::AtBoundary("end")),
        }
    }

    /// Replace the timeline wholesale (project load). History restarts here.
    pub fn replace(&mut self, mut state: TimelineState) {
        self.gesture = None;
        state.normalize_ids();
        state.spread_tied_layers();
        state.recompute_duration();
        tracing::info!(
            entities = state.entity_count(),
            duration = state.duration,
            "Timeline replaced"
        );
        self.history.reset(state.clone());
        self.set_state(state);
    }

    /// Remove every clip that uses an evicted asset, as one undoable edit.
    pub fn evict_asset(&mut self, asset: AssetId) -> Vec<EntityId> {
        self.commit_gesture();
        let mut next = self.state.clone();
        let removed = next.remove_asset_clips(asset);
        if !removed.is_empty() {
            next.recompute_duration();
            tracing::info!(%asset, clips = removed.len(), "Asset evicted from timeline");
            self.set_state(next);
            self.history.push("Remove asset", self.state.clone());
        }
        removed
    }

    fn set_state(&mut self, state: TimelineState) {
        self.state = state;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_project_model::{Clip, MediaAsset, MediaKind};
    use std::path::PathBuf;

    fn video(duration: f64) -> MediaAsset {
        let mut a =
            MediaAsset::with_fallback_metadata(AssetId(3), MediaKind::Video, PathBuf::from("v"));
        a.duration_seconds = duration;
        a
    }

    fn store_with_clip() -> TimelineStore {
        let mut store = TimelineStore::new(&EditorDefaults::default());
        store
            .execute(EditOp::AddClip { asset: video(5.0) })
            .unwrap();
        store
    }

    #[test]
    fn test_loaded_ties_are_spread_once() {
        let mut state = TimelineState::new();
        for _ in 0..3 {
            let id = state.allocate_id();
            state.clips.push(Clip::from_asset(id, &video(5.0), 0.0, 7));
        }
        let store = TimelineStore::with_state(state, &EditorDefaults::default());
        let zs: Vec<_> = store.state().clips.iter().map(|c| c.z_index).collect();
        assert_eq!(zs, vec![0, 1, 2]);
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_execute_pushes_history() {
        let mut store = store_with_clip();
        assert_eq!(store.history().len(), 2);
        store.undo().unwrap();
        assert!(store.state().is_empty());
        store.redo().unwrap();
        assert_eq!(store.state().clips.len(), 1);
    }

    #[test]
    fn test_noop_does_not_push() {
        let mut store = store_with_clip();
        let revision = store.revision();
        let err = store
            .execute(EditOp::Move {
                id: EntityId(1),
                start: 0.0,
            })
            .unwrap_err();
        assert_eq!(err, EditError::NoOp);
        assert_eq!(store.history().len(), 2);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_rejected_edit_leaves_state() {
        let mut store = store_with_clip();
        let before = store.state().clone();
        assert!(store
            .execute(EditOp::Split {
                id: EntityId(1),
                at: 9.0
            })
            .is_err());
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_gesture_pushes_once() {
        let mut store = store_with_clip();
        store.begin_gesture("Drag");
        for start in [0.5, 1.0, 1.5, 2.0] {
            store
                .update_gesture(&EditOp::Move {
                    id: EntityId(1),
                    start,
                })
                .unwrap();
        }
        assert_eq!(store.history().len(), 2);
        assert!(store.commit_gesture());
        assert_eq!(store.history().len(), 3);
        assert_eq!(store.state().clip(EntityId(1)).unwrap().start, 2.0);

        store.undo().unwrap();
        assert_eq!(store.state().clip(EntityId(1)).unwrap().start, 0.0);
    }

    #[test]
    fn test_gesture_back_to_origin_pushes_nothing() {
        let mut store = store_with_clip();
        store.begin_gesture("Drag");
        store
            .update_gesture(&EditOp::Move {
                id: EntityId(1),
                start: 3.0,
            })
            .unwrap();
        store
            .update_gesture(&EditOp::Move {
                id: EntityId(1),
                start: 0.0,
            })
            .unwrap();
        assert!(!store.commit_gesture());
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn test_undo_at_start_reports_boundary() {
        let mut store = TimelineStore::new(&EditorDefaults::default());
        assert_eq!(store.undo(), Err(EditError::AtBoundary("start")));
        assert_eq!(store.redo(), Err(EditError::AtBoundary("end")));
    }

    #[test]
    fn test_replace_resets_history() {
        let mut store = store_with_clip();
        let mut loaded = TimelineState::new();
        loaded.next_id = 0;
        store.replace(loaded);
        assert!(store.state().is_empty());
        assert!(!store.history().can_undo());
        assert_eq!(store.state().next_id, 1);
    }

    #[test]
    fn test_evict_asset_removes_clips() {
        let mut store = store_with_clip();
        store
            .execute(EditOp::AddText {
                text: "t".into(),
                at: None,
                duration: 1.0,
            })
            .unwrap();
        let removed = store.evict_asset(AssetId(3));
        assert_eq!(removed, vec![EntityId(1)]);
        assert!(store.state().clips.is_empty());
        assert_eq!(store.state().duration, 1.0);
        store.undo().unwrap();
        assert_eq!(store.state().clips.len(), 1);
    }
}
