//! End-to-end checks for planning, compositing and export.

use std::path::PathBuf;
use std::sync::Arc;

use image::{Rgba as Px, RgbaImage};
use montage_common::{ExportDefaults, PlaybackDefaults};
use montage_project_model::{
    AssetId, Clip, EntityId, Filter, FilterKind, FrameSize, MediaAsset, MediaCatalog, MediaKind,
    Rgba, TextOverlay, TimelineState, TransitionKind, TransitionSpec,
};
use montage_render_engine::transition::TransitionEngine;
use montage_render_engine::{
    export_timeline, plan_frame, Compositor, ExportError, ExportInputs, ExportJob, ExportSink,
    FontBook, MemorySink, PictureSource, RenderLoop,
};
use proptest::prelude::*;

const FRAME: FrameSize = FrameSize {
    width: 32,
    height: 18,
};

/// Horizontal gradient tinted per asset, so filters have something to bite on.
struct Gradients;

impl PictureSource for Gradients {
    fn picture(&mut self, _clip: &Clip, asset: &MediaAsset, _t: f64) -> Option<Arc<RgbaImage>> {
        let tint = (asset.id.0 * 60 % 256) as u8;
        Some(Arc::new(RgbaImage::from_fn(32, 18, |x, y| {
            Px([(x * 8) as u8, (y * 14) as u8, tint, 255])
        })))
    }
}

fn video(id: u64, duration: f64) -> MediaAsset {
    let mut asset =
        MediaAsset::with_fallback_metadata(AssetId(id), MediaKind::Video, PathBuf::from("v.mp4"));
    asset.duration_seconds = duration;
    asset.width = 32;
    asset.height = 18;
    asset
}

/// Two overlapping filtered clips with a dissolve between them and a caption.
fn scene() -> (TimelineState, MediaCatalog) {
    let a = video(1, 4.0);
    let b = video(2, 4.0);
    let mut state = TimelineState::new();

    let first = state.allocate_id();
    let mut clip = Clip::from_asset(first, &a, 0.0, 0);
    clip.filters = vec![
        Filter::new(FilterKind::Sepia, 60.0),
        Filter::new(FilterKind::Contrast, 140.0),
        Filter::new(FilterKind::Blur, 1.5),
    ];
    state.clips.push(clip);

    let second = state.allocate_id();
    let mut clip = Clip::from_asset(second, &b, 3.0, 1);
    clip.filters = vec![
        Filter::new(FilterKind::HueRotate, 90.0),
        Filter::new(FilterKind::Saturation, 50.0),
    ];
    clip.transform.rotation = 15.0;
    state.clips.push(clip);

    let caption = state.allocate_id();
    let mut text = TextOverlay::new(caption, "hello", 1.0, 6.0, 2);
    text.background_color = Some("#00000080".to_string());
    state.text_overlays.push(text);

    let transition = state.allocate_id();
    state.transitions.push(TransitionSpec {
        id: transition,
        kind: TransitionKind::Dissolve,
        duration_ms: 800,
        from: first,
        to: second,
    });
    state.recompute_duration();
    (state, MediaCatalog::from_assets([a, b]))
}

fn compositor() -> Compositor {
    Compositor::new(FRAME, Rgba::BLACK, FontBook::empty(), 30)
}

#[test]
fn repeated_renders_are_byte_identical() {
    let (state, catalog) = scene();
    let c = compositor();
    for t in [0.0, 1.2, 3.1, 3.45, 4.0, 6.5] {
        let first = c.render(&state, &catalog, t, &mut Gradients);
        let second = c.render(&state, &catalog, t, &mut Gradients);
        assert_eq!(first.as_raw(), second.as_raw(), "render at {t} differs");
    }
}

#[test]
fn transition_frames_stay_within_the_window() {
    let (state, _) = scene();
    let engine = TransitionEngine::new(30);
    let inside = plan_frame(&state, 3.4, &engine);
    let incoming = inside
        .ops
        .iter()
        .find(|op| op.id == EntityId(2))
        .and_then(|op| op.transition.as_ref())
        .expect("transition active at 3.4");
    assert!(incoming.progress > 0.0 && incoming.progress < 1.0);

    let after = plan_frame(&state, 3.9, &engine);
    assert!(after.ops.iter().all(|op| op.transition.is_none()));
}

#[test]
fn export_renders_every_frame_and_rewinds() {
    let (state, catalog) = scene();
    let c = compositor();
    let mut render_loop = RenderLoop::new(&PlaybackDefaults::default());
    let mut job = ExportJob::new("out.mp4", &ExportDefaults::default());
    job.fps = 4;
    let mut sink = MemorySink::new();

    let summary = export_timeline(
        &job,
        ExportInputs {
            state: &state,
            catalog: &catalog,
            compositor: &c,
            pictures: &mut Gradients,
        },
        &mut render_loop,
        &mut sink,
        None,
    )
    .unwrap();

    assert_eq!(summary.frames, 28);
    assert_eq!(sink.frames.len(), 28);
    assert!(sink.finished);
    assert_eq!(sink.fps, 4);
    assert_eq!(render_loop.time(), 0.0);
    assert!(!render_loop.is_playing());

    let direct = c.render(&state, &catalog, 3.25, &mut Gradients);
    assert_eq!(sink.frames[13].as_raw(), direct.as_raw());
}

#[test]
fn partial_export_covers_only_the_requested_range() {
    let (state, catalog) = scene();
    let c = compositor();
    let mut render_loop = RenderLoop::new(&PlaybackDefaults::default());
    let mut job = ExportJob::new("out.mp4", &ExportDefaults::default());
    job.fps = 10;
    job.start_secs = Some(2.0);
    job.end_secs = Some(2.5);
    let mut sink = MemorySink::new();

    let summary = export_timeline(
        &job,
        ExportInputs {
            state: &state,
            catalog: &catalog,
            compositor: &c,
            pictures: &mut Gradients,
        },
        &mut render_loop,
        &mut sink,
        None,
    )
    .unwrap();
    assert_eq!(summary.frames, 5);
    assert_eq!((summary.start_secs, summary.end_secs), (2.0, 2.5));
}

#[test]
fn empty_timeline_export_fails() {
    let state = TimelineState::new();
    let catalog = MediaCatalog::new();
    let c = compositor();
    let mut render_loop = RenderLoop::new(&PlaybackDefaults::default());
    let job = ExportJob::new("out.mp4", &ExportDefaults::default());
    let mut sink = MemorySink::new();

    let err = export_timeline(
        &job,
        ExportInputs {
            state: &state,
            catalog: &catalog,
            compositor: &c,
            pictures: &mut Gradients,
        },
        &mut render_loop,
        &mut sink,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ExportError::EmptyTimeline));
    assert!(sink.frames.is_empty());
}

/// Accepts a fixed number of frames, then refuses.
struct BrokenPipe {
    inner: MemorySink,
    budget: usize,
}

impl ExportSink for BrokenPipe {
    fn begin(&mut self, size: FrameSize, fps: u32) -> Result<(), ExportError> {
        self.inner.begin(size, fps)
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> Result<(), ExportError> {
        if self.inner.frames.len() >= self.budget {
            return Err(ExportError::Write("broken pipe".into()));
        }
        self.inner.write_frame(frame)
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.inner.finish()
    }

    fn name(&self) -> &str {
        "broken"
    }
}

#[test]
fn failed_export_stops_and_rewinds() {
    let (state, catalog) = scene();
    let c = compositor();
    let mut render_loop = RenderLoop::new(&PlaybackDefaults::default());
    render_loop.seek(2.0, &state);
    let mut job = ExportJob::new("out.mp4", &ExportDefaults::default());
    job.fps = 2;
    let mut sink = BrokenPipe {
        inner: MemorySink::new(),
        budget: 3,
    };

    let stages = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = Arc::clone(&stages);
    let err = export_timeline(
        &job,
        ExportInputs {
            state: &state,
            catalog: &catalog,
            compositor: &c,
            pictures: &mut Gradients,
        },
        &mut render_loop,
        &mut sink,
        Some(Box::new(move |p| seen.lock().unwrap().push(p.stage))),
    )
    .unwrap_err();

    assert!(matches!(err, ExportError::Write(_)));
    assert_eq!(sink.inner.frames.len(), 3);
    assert!(!sink.inner.finished);
    assert_eq!(render_loop.time(), 0.0);
    assert!(!render_loop.is_playing());
    let stages = stages.lock().unwrap();
    assert_eq!(
        stages.last().copied(),
        Some(montage_render_engine::ExportStage::Failed)
    );
}

fn arb_timeline() -> impl Strategy<Value = TimelineState> {
    let clip = (0.0f64..20.0, 0.1f64..8.0, -3i64..4, any::<bool>());
    let text = (0.0f64..20.0, 0.1f64..8.0, -3i64..4, any::<bool>());
    (
        prop::collection::vec(clip, 0..5),
        prop::collection::vec(text, 0..4),
    )
        .prop_map(|(clips, texts)| {
            let asset = video(1, 100.0);
            let mut state = TimelineState::new();
            for (start, len, z, visible) in clips {
                let id = state.allocate_id();
                let mut c = Clip::from_asset(id, &asset, start, z);
                c.end = start + len;
                c.trim_end = len;
                c.visible = visible;
                state.clips.push(c);
            }
            for (start, len, z, visible) in texts {
                let id = state.allocate_id();
                let mut t = TextOverlay::new(id, "t", start, start + len, z);
                t.visible = visible;
                state.text_overlays.push(t);
            }
            state.recompute_duration();
            state
        })
}

/// Visible set straight from the half-open rule, in paint order.
fn expected_at(state: &TimelineState, t: f64) -> Vec<EntityId> {
    let mut hits: Vec<(i64, EntityId)> = state
        .clips
        .iter()
        .filter(|c| c.visible && c.start <= t && t < c.end)
        .map(|c| (c.z_index, c.id))
        .chain(
            state
                .text_overlays
                .iter()
                .filter(|o| o.visible && o.start <= t && t < o.end)
                .map(|o| (o.z_index, o.id)),
        )
        .collect();
    hits.sort();
    hits.into_iter().map(|(_, id)| id).collect()
}

proptest! {
    #[test]
    fn planned_layers_match_the_half_open_rule(state in arb_timeline()) {
        let engine = TransitionEngine::new(30);
        let mut samples = vec![0.0, state.duration];
        for e in state.entities() {
            samples.extend([e.start(), e.end() - 1e-6, e.end()]);
        }
        for t in samples {
            let plan = plan_frame(&state, t, &engine);
            prop_assert_eq!(plan.ids(), expected_at(&state, t), "t = {}", t);
        }
    }
}
