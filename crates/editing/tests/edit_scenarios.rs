//! End-to-end editing scenarios driven through the Timeline Store.

use std::path::PathBuf;

use montage_common::EditorDefaults;
use montage_editing::{EditError, EditOp, TimelineStore};
use montage_project_model::{
    AssetId, Clip, EntityId, Filter, FilterKind, MediaAsset, MediaKind, Timed, TransitionKind,
};

fn asset(id: u64, duration: f64) -> MediaAsset {
    let mut asset =
        MediaAsset::with_fallback_metadata(AssetId(id), MediaKind::Video, PathBuf::from("v.mp4"));
    asset.duration_seconds = duration;
    asset
}

fn spans(store: &TimelineStore) -> Vec<(u64, f64, f64)> {
    let mut spans: Vec<_> = store
        .state()
        .clips
        .iter()
        .map(|c| (c.id.0, c.start, c.end))
        .collect();
    spans.sort_by(|a, b| a.1.total_cmp(&b.1));
    spans
}

#[test]
fn duplicate_lands_after_the_original() {
    let mut store = TimelineStore::new(&EditorDefaults::default());
    store.execute(EditOp::AddClip { asset: asset(1, 5.0) }).unwrap();
    store
        .execute(EditOp::SetFilters {
            id: EntityId(1),
            filters: vec![Filter::new(FilterKind::Sepia, 40.0)],
        })
        .unwrap();
    store.execute(EditOp::Duplicate { id: EntityId(1) }).unwrap();

    let original = store.state().clip(EntityId(1)).unwrap().clone();
    let copy = store.state().clip(EntityId(2)).unwrap().clone();
    assert_eq!((copy.start, copy.end), (5.0, 10.0));
    // The copy goes on top of the stack like any new entity.
    assert_eq!(copy.z_index, original.z_index + 1);
    assert_eq!(
        Clip {
            id: original.id,
            start: original.start,
            end: original.end,
            z_index: original.z_index,
            ..copy
        },
        original
    );
    assert_eq!(store.state().duration, 10.0);
}

#[test]
fn ripple_delete_closes_the_gap() {
    let mut store = TimelineStore::new(&EditorDefaults::default());
    for id in 1..=3 {
        store.execute(EditOp::AddClip { asset: asset(id, 5.0) }).unwrap();
    }
    assert_eq!(
        spans(&store),
        vec![(1, 0.0, 5.0), (2, 5.0, 10.0), (3, 10.0, 15.0)]
    );

    store.execute(EditOp::RippleDelete { id: EntityId(2) }).unwrap();
    assert_eq!(spans(&store), vec![(1, 0.0, 5.0), (3, 5.0, 10.0)]);
    assert_eq!(store.state().duration, 10.0);

    store.undo().unwrap();
    assert_eq!(spans(&store).len(), 3);
}

#[test]
fn ripple_delete_leaves_other_tracks_alone() {
    let mut store = TimelineStore::new(&EditorDefaults::default());
    store.execute(EditOp::AddClip { asset: asset(1, 5.0) }).unwrap();
    store.execute(EditOp::AddClip { asset: asset(2, 5.0) }).unwrap();
    store
        .execute(EditOp::AddText {
            text: "caption".into(),
            at: Some(6.0),
            duration: 2.0,
        })
        .unwrap();

    store.execute(EditOp::RippleDelete { id: EntityId(1) }).unwrap();
    let text = store.state().text(EntityId(3)).unwrap();
    assert_eq!((text.start, text.end), (6.0, 8.0));
    assert_eq!(spans(&store), vec![(2, 0.0, 5.0)]);
}

#[test]
fn split_keeps_the_incoming_transition_on_the_head() {
    let mut store = TimelineStore::new(&EditorDefaults::default());
    store.execute(EditOp::AddClip { asset: asset(1, 4.0) }).unwrap();
    store.execute(EditOp::AddClip { asset: asset(2, 4.0) }).unwrap();
    store
        .execute(EditOp::AddTransition {
            kind: TransitionKind::Dissolve,
            duration_ms: 500,
            from: EntityId(1),
            to: EntityId(2),
        })
        .unwrap();
    let transition = store.state().transitions[0].id;

    store
        .execute(EditOp::Split {
            id: EntityId(2),
            at: 6.0,
        })
        .unwrap();
    let kept = &store.state().transitions[0];
    assert_eq!(kept.id, transition);
    // The first half of the split keeps the incoming transition.
    let head = store.state().clip(kept.to).unwrap();
    assert_eq!((head.start(), head.end()), (4.0, 6.0));
}

#[test]
fn trim_cannot_exceed_source() {
    let mut store = TimelineStore::new(&EditorDefaults::default());
    store.execute(EditOp::AddClip { asset: asset(1, 5.0) }).unwrap();
    store
        .execute(EditOp::TrimEnd {
            id: EntityId(1),
            at: 3.0,
        })
        .unwrap();
    store
        .execute(EditOp::TrimEnd {
            id: EntityId(1),
            at: 50.0,
        })
        .unwrap();
    let clip = store.state().clip(EntityId(1)).unwrap();
    assert_eq!(clip.end, 5.0);
    assert_eq!(clip.trim_end, 5.0);

    assert_eq!(
        store.execute(EditOp::TrimEnd {
            id: EntityId(1),
            at: 50.0,
        }),
        Err(EditError::NoOp)
    );
}

#[test]
fn missing_entity_is_reported() {
    let mut store = TimelineStore::new(&EditorDefaults::default());
    assert_eq!(
        store.execute(EditOp::Delete { id: EntityId(9) }),
        Err(EditError::NotFound(EntityId(9)))
    );
    assert!(!store.history().can_undo());
}
