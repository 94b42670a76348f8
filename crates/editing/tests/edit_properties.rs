//! Property tests for the timeline edit algorithms and undo history.

use std::path::PathBuf;

use montage_common::EditorDefaults;
use montage_editing::ops::LayerDirection;
use montage_editing::{apply, EditError, EditOp, EditParams, TimelineStore};
use montage_project_model::{
    AssetId, Clip, EntityId, MediaAsset, MediaKind, TextOverlay, TimelineState,
};
use proptest::prelude::*;

const TOL: f64 = 1e-9;

fn source(duration: f64) -> MediaAsset {
    let mut asset =
        MediaAsset::with_fallback_metadata(AssetId(1), MediaKind::Video, PathBuf::from("a.mp4"));
    asset.duration_seconds = duration;
    asset
}

/// Lay out clips on the video track. Each `(gap, len, head)` places a clip
/// `gap` seconds after the previous one, `len` long, presenting source from
/// `head` onward out of a 100 s source.
fn video_track(shape: &[(f64, f64, f64)]) -> TimelineState {
    let asset = source(100.0);
    let mut state = TimelineState::new();
    let mut cursor = 0.0;
    for (i, &(gap, len, head)) in shape.iter().enumerate() {
        let start = cursor + gap;
        let mut clip = Clip::from_asset(EntityId(i as u64 + 1), &asset, start, i as i64);
        clip.end = start + len;
        clip.trim_start = head;
        clip.trim_end = head + len;
        state.clips.push(clip);
        cursor = start + len;
    }
    state.next_id = shape.len() as u64 + 1;
    state.recompute_duration();
    state
}

fn track_shape() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((0.0..3.0f64, 1.0..20.0f64, 0.0..30.0f64), 1..6)
}

proptest! {
    #[test]
    fn split_partitions_the_clip(
        start in 0.0..100.0f64,
        len in 0.5..60.0f64,
        fraction in 0.01..0.99f64,
    ) {
        let state = video_track(&[(start, len, 0.0)]);
        let at = start + len * fraction;
        let next = apply(&state, &EditOp::Split { id: EntityId(1), at }, &EditParams::default())
            .unwrap();

        let first = next.clip(EntityId(2)).unwrap();
        let second = next.clip(EntityId(3)).unwrap();
        prop_assert!(next.clip(EntityId(1)).is_none());
        prop_assert_eq!(first.end, at);
        prop_assert_eq!(second.start, at);
        prop_assert_eq!(first.start, state.clips[0].start);
        prop_assert_eq!(second.end, state.clips[0].end);
        prop_assert_eq!(first.trim_end, second.trim_start);
        prop_assert!((next.duration - state.duration).abs() < TOL);
    }

    #[test]
    fn ripple_trim_shifts_downstream(
        shape in track_shape(),
        pick in any::<prop::sample::Index>(),
        amount in -1.0..1.0f64,
    ) {
        let state = video_track(&shape);
        let i = pick.index(shape.len());
        let target = &state.clips[i];
        let len = target.duration();
        let delta = if amount < 0.0 { amount * (len - 0.2) } else { amount * 5.0 };
        let old_end = target.end;

        let result = apply(
            &state,
            &EditOp::RippleTrimEnd { id: target.id, at: old_end + delta },
            &EditParams::default(),
        );
        let next = match result {
            Ok(next) => next,
            Err(EditError::NoOp) => return Ok(()),
            Err(err) => return Err(TestCaseError::fail(err.to_string())),
        };

        prop_assert!((next.clips[i].end - (old_end + delta)).abs() < TOL);
        for (before, after) in state.clips.iter().zip(&next.clips) {
            if before.id == target.id {
                continue;
            }
            if before.start >= old_end {
                prop_assert!((after.start - (before.start + delta)).abs() < TOL);
            } else {
                prop_assert_eq!(after.start, before.start);
            }
        }
        prop_assert!((next.duration - (state.duration + delta)).abs() < TOL);
    }

    #[test]
    fn rolling_trim_conserves_duration(
        shape in prop::collection::vec((1.0..20.0f64, 10.0..30.0f64), 2..6),
        pick in any::<prop::sample::Index>(),
        amount in -10.0..10.0f64,
    ) {
        // Abutting clips, each with source to spare on both sides.
        let abutting: Vec<_> = shape.iter().map(|&(len, head)| (0.0, len, head)).collect();
        let state = video_track(&abutting);
        let i = pick.index(shape.len() - 1);
        let target = &state.clips[i];
        let neighbor_end = state.clips[i + 1].end;

        let result = apply(
            &state,
            &EditOp::RollingTrimEnd { id: target.id, at: target.end + amount },
            &EditParams::default(),
        );
        let next = match result {
            Ok(next) => next,
            Err(EditError::NoOp) => return Ok(()),
            Err(err) => return Err(TestCaseError::fail(err.to_string())),
        };

        prop_assert!((next.duration - state.duration).abs() < TOL);
        prop_assert!((next.clips[i].end - next.clips[i + 1].start).abs() < TOL);
        prop_assert_eq!(next.clips[i + 1].end, neighbor_end);
        prop_assert!(next.clips[i + 1].duration() >= 0.1 - TOL);
        prop_assert!(next.clips[i].duration() >= 0.1 - TOL);
    }

    #[test]
    fn layer_swap_is_self_inverse(
        zs in Just((0..6i64).collect::<Vec<_>>()).prop_shuffle(),
        pick in any::<prop::sample::Index>(),
        up_first in any::<bool>(),
    ) {
        let mut state = TimelineState::new();
        for (i, z) in zs.iter().enumerate() {
            let id = state.allocate_id();
            let start = i as f64;
            state.text_overlays.push(TextOverlay::new(id, "t", start, start + 1.0, *z));
        }
        state.recompute_duration();
        let id = state.text_overlays[pick.index(zs.len())].id;
        let (there, back) = if up_first {
            (LayerDirection::Up, LayerDirection::Down)
        } else {
            (LayerDirection::Down, LayerDirection::Up)
        };
        let params = EditParams::default();

        let moved = match apply(&state, &EditOp::Layer { id, direction: there }, &params) {
            Ok(next) => next,
            Err(EditError::NoOp) => return Ok(()),
            Err(err) => return Err(TestCaseError::fail(err.to_string())),
        };
        let restored = apply(&moved, &EditOp::Layer { id, direction: back }, &params).unwrap();
        prop_assert_eq!(restored, state);
    }

    #[test]
    fn layer_swap_is_self_inverse_after_duplicates_and_splits(
        script in prop::collection::vec((0u8..3, any::<prop::sample::Index>(), 0.05..0.95f64), 1..12),
        pick in any::<prop::sample::Index>(),
        up_first in any::<bool>(),
    ) {
        let params = EditParams::default();
        let mut state =
            apply(&TimelineState::new(), &EditOp::AddClip { asset: source(60.0) }, &params).unwrap();
        for (kind, target, fraction) in script {
            let ids: Vec<EntityId> = state.entities().map(|e| e.id()).collect();
            let id = ids[target.index(ids.len())];
            let entity = state.entity(id).unwrap();
            let at = entity.start() + entity.duration() * fraction;
            let op = match kind {
                0 => EditOp::Duplicate { id },
                1 => EditOp::Split { id, at },
                _ => EditOp::AddText { text: "t".into(), at: Some(at), duration: 2.0 },
            };
            if let Ok(next) = apply(&state, &op, &params) {
                state = next;
            }
        }

        let mut zs: Vec<i64> = state.entities().map(|e| e.z_index()).collect();
        zs.sort_unstable();
        zs.dedup();
        prop_assert_eq!(zs.len(), state.entity_count());

        let ids: Vec<EntityId> = state.entities().map(|e| e.id()).collect();
        let id = ids[pick.index(ids.len())];
        let (there, back) = if up_first {
            (LayerDirection::Up, LayerDirection::Down)
        } else {
            (LayerDirection::Down, LayerDirection::Up)
        };
        let moved = match apply(&state, &EditOp::Layer { id, direction: there }, &params) {
            Ok(next) => next,
            Err(EditError::NoOp) => return Ok(()),
            Err(err) => return Err(TestCaseError::fail(err.to_string())),
        };
        let touched = state
            .entities()
            .zip(moved.entities())
            .filter(|(a, b)| a.z_index() != b.z_index())
            .count();
        prop_assert_eq!(touched, 2);
        let restored = apply(&moved, &EditOp::Layer { id, direction: back }, &params).unwrap();
        prop_assert_eq!(restored, state);
    }

    #[test]
    fn undo_redo_round_trips(
        script in prop::collection::vec((0u8..8, any::<prop::sample::Index>(), 0.0..1.0f64), 1..25),
        redo_fraction in 0.0..1.0f64,
    ) {
        let mut store = TimelineStore::new(&EditorDefaults::default());
        store.execute(EditOp::AddClip { asset: source(8.0) }).unwrap();
        store.execute(EditOp::AddText { text: "a".into(), at: Some(1.0), duration: 4.0 }).unwrap();
        let before = store.state().clone();

        let mut applied = 0;
        for (kind, pick, value) in script {
            let ids: Vec<EntityId> = store.state().entities().map(|e| e.id()).collect();
            if ids.is_empty() {
                break;
            }
            let id = ids[pick.index(ids.len())];
            let t = value * store.state().duration.max(1.0);
            let op = match kind {
                0 => EditOp::Split { id, at: t },
                1 => EditOp::Duplicate { id },
                2 => EditOp::Move { id, start: t },
                3 => EditOp::TrimEnd { id, at: t + 0.5 },
                4 => EditOp::RippleTrimEnd { id, at: t + 0.5 },
                5 => EditOp::Layer { id, direction: LayerDirection::Up },
                6 => EditOp::RippleDelete { id },
                _ => EditOp::AddText { text: "b".into(), at: Some(t), duration: 1.0 },
            };
            if store.execute(op).is_ok() {
                applied += 1;
            }
        }
        let after = store.state().clone();

        let redo_count = (applied as f64 * redo_fraction) as usize;
        for _ in 0..applied {
            store.undo().unwrap();
        }
        prop_assert_eq!(store.state(), &before);

        for _ in 0..redo_count {
            store.redo().unwrap();
        }
        let partial = store.state().clone();
        for _ in 0..redo_count {
            store.undo().unwrap();
        }
        for _ in 0..redo_count {
            store.redo().unwrap();
        }
        prop_assert_eq!(store.state(), &partial);

        for _ in redo_count..applied {
            store.redo().unwrap();
        }
        prop_assert_eq!(store.state(), &after);
    }
}
