//! Interaction Controller: pointer input to edit operations.
//!
//! Two surfaces accept pointer input:
//! - **Preview:** the composited frame. Hit-testing picks the topmost
//!   visible entity at the playhead; dragging repositions it.
//! - **Timeline:** the ruler (scrubbing) and one lane per track. Dragging a
//!   body moves the entity, dragging an edge handle trims it.
//!
//! A drag holds a [`PointerGrab`] from pointer-down to pointer-up. While the
//! grab is held, every move is routed to it regardless of where the pointer
//! is, and releasing it always commits exactly one history entry.

use montage_common::EditorDefaults;
use montage_project_model::{
    ClipTransform, EntityId, EntityRef, FrameSize, MediaCatalog, Point2D, Rect, TimelineState,
    TrackKind,
};

use crate::error::EditError;
use crate::ops::EditOp;
use crate::store::TimelineStore;

/// Maps render-surface (device) pixels to output-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMapping {
    pub surface_width: f64,
    pub surface_height: f64,
    pub frame: FrameSize,
}

impl FrameMapping {
    pub fn new(surface_width: f64, surface_height: f64, frame: FrameSize) -> Self {
        Self {
            surface_width,
            surface_height,
            frame,
        }
    }

    /// Identity mapping for a surface the size of the frame.
    pub fn identity(frame: FrameSize) -> Self {
        Self::new(frame.width as f64, frame.height as f64, frame)
    }

    pub fn scale(&self) -> (f64, f64) {
        (
            self.frame.width as f64 / self.surface_width.max(1.0),
            self.frame.height as f64 / self.surface_height.max(1.0),
        )
    }

    pub fn to_frame(&self, device: Point2D) -> Point2D {
        let (sx, sy) = self.scale();
        Point2D::new(device.x * sx, device.y * sy)
    }
}

/// Horizontal time scale of the timeline view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineScale {
    pub pixels_per_second: f64,
    pub zoom: f64,
}

impl TimelineScale {
    /// `time = pixelX / (pixelsPerSecond × zoom)`, never negative.
    pub fn time_at(&self, x: f64) -> f64 {
        (x / (self.pixels_per_second * self.zoom).max(f64::EPSILON)).max(0.0)
    }

    pub fn x_at(&self, time: f64) -> f64 {
        time * self.pixels_per_second * self.zoom
    }
}

/// Vertical layout of the timeline view.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineLayout {
    pub scale: TimelineScale,
    pub ruler_height: f64,
    pub track_height: f64,
    /// Lanes from top to bottom.
    pub tracks: Vec<TrackKind>,
    /// Width of the trim handle at each entity edge.
    pub trim_handle_px: f64,
}

impl TimelineLayout {
    pub fn from_defaults(defaults: &EditorDefaults) -> Self {
        Self {
            scale: TimelineScale {
                pixels_per_second: defaults.pixels_per_second,
                zoom: 1.0,
            },
            ruler_height: 24.0,
            track_height: 48.0,
            tracks: vec![
                TrackKind::Text,
                TrackKind::Video,
                TrackKind::Image,
                TrackKind::Audio,
            ],
            trim_handle_px: defaults.trim_handle_px,
        }
    }

    pub fn lane_at(&self, y: f64) -> Option<TrackKind> {
        if y < self.ruler_height {
            return None;
        }
        let index = ((y - self.ruler_height) / self.track_height.max(1.0)).floor() as usize;
        self.tracks.get(index).copied()
    }
}

/// Which part of an entity on the timeline was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Head,
    Body,
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineHit {
    Ruler { time: f64 },
    Entity { id: EntityId, zone: Zone, time: f64 },
    Empty { track: Option<TrackKind>, time: f64 },
}

/// Resolve a timeline-view position. Overlapping entities resolve to the
/// topmost layer.
pub fn timeline_hit(state: &TimelineState, layout: &TimelineLayout, x: f64, y: f64) -> TimelineHit {
    let time = layout.scale.time_at(x);
    let Some(track) = layout.lane_at(y) else {
        if y < layout.ruler_height {
            return TimelineHit::Ruler { time };
        }
        return TimelineHit::Empty { track: None, time };
    };

    let topmost = state
        .entities()
        .filter(|e| e.track() == track)
        .filter(|e| {
            let x0 = layout.scale.x_at(e.start());
            let x1 = layout.scale.x_at(e.end());
            x >= x0 && x <= x1
        })
        .max_by_key(|e| e.layer_key());

    match topmost {
        Some(e) => {
            let x0 = layout.scale.x_at(e.start());
            let x1 = layout.scale.x_at(e.end());
            let handle = layout.trim_handle_px.min((x1 - x0) / 3.0);
            let zone = if x - x0 <= handle {
                Zone::Head
            } else if x1 - x <= handle {
                Zone::Tail
            } else {
                Zone::Body
            };
            TimelineHit::Entity {
                id: e.id(),
                zone,
                time,
            }
        }
        None => TimelineHit::Empty {
            track: Some(track),
            time,
        },
    }
}

/// Frame-space bounding box of a visible entity, or `None` for entities
/// without picture (audio, images not in the catalog).
pub fn entity_bounds(entity: EntityRef<'_>, catalog: &MediaCatalog, frame: FrameSize) -> Option<Rect> {
    match entity {
        EntityRef::Text(text) => Some(text.bounds(frame)),
        EntityRef::Clip(clip) => {
            if !clip.kind.has_picture() {
                return None;
            }
            let asset = catalog.get(clip.asset_id)?;
            if asset.width == 0 || asset.height == 0 {
                return None;
            }
            Some(clip.frame_bounds(asset.width as f64, asset.height as f64, frame))
        }
    }
}

/// Topmost visible entity under `point` (frame pixels) at time `t`.
pub fn hit_test(
    state: &TimelineState,
    catalog: &MediaCatalog,
    frame: FrameSize,
    t: f64,
    point: Point2D,
) -> Option<EntityId> {
    state
        .visible_at(t)
        .into_iter()
        .rev()
        .find(|e| entity_bounds(*e, catalog, frame).is_some_and(|r| r.contains(point)))
        .map(|e| e.id())
}

/// Editing tool selected in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Razor,
}

/// What a held grab is dragging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragTarget {
    /// Playhead scrubbing on the ruler.
    Scrub,
    /// Timeline body drag. `offset` is pointer time minus entity start at
    /// grab time.
    MoveEntity { id: EntityId, offset: f64 },
    TrimHead { id: EntityId },
    TrimTail { id: EntityId },
    /// Preview drag of a text overlay; offset in percent.
    MoveOverlay { id: EntityId, offset: (f64, f64) },
    /// Preview drag of a clip; offset in frame pixels.
    MoveClip {
        id: EntityId,
        offset: (f64, f64),
        transform: ClipTransform,
    },
}

impl DragTarget {
    fn label(&self) -> &'static str {
        match self {
            Self::Scrub => "Scrub",
            Self::MoveEntity { .. } => "Move",
            Self::TrimHead { .. } => "Trim start",
            Self::TrimTail { .. } => "Trim end",
            Self::MoveOverlay { .. } => "Move text",
            Self::MoveClip { .. } => "Reposition clip",
        }
    }
}

/// Exclusive capture of pointer input for the duration of a drag.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerGrab {
    target: DragTarget,
    moves: u32,
}

impl PointerGrab {
    pub fn target(&self) -> &DragTarget {
        &self.target
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }
}

/// Outcome of a pointer or key event.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEffect {
    Nothing,
    /// The playhead should move here.
    Seek(f64),
    Selected(EntityId),
    Edited,
    /// The edit's preconditions failed; show as a notice.
    Rejected(EditError),
}

pub struct InteractionController {
    tool: Tool,
    selection: Option<EntityId>,
    grab: Option<PointerGrab>,
    layout: TimelineLayout,
    mapping: FrameMapping,
}

impl InteractionController {
    pub fn new(layout: TimelineLayout, mapping: FrameMapping) -> Self {
        Self {
            tool: Tool::Select,
            selection: None,
            grab: None,
            layout,
            mapping,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        tracing::debug!(?tool, "Tool changed");
        self.tool = tool;
    }

    pub fn selection(&self) -> Option<EntityId> {
        self.selection
    }

    pub fn select(&mut self, id: Option<EntityId>) {
        self.selection = id;
    }

    /// Drop the selection if the entity no longer exists.
    pub fn sync_selection(&mut self, state: &TimelineState) {
        if self.selection.is_some_and(|id| !state.contains(id)) {
            self.selection = None;
        }
    }

    pub fn grab(&self) -> Option<&PointerGrab> {
        self.grab.as_ref()
    }

    pub fn layout(&self) -> &TimelineLayout {
        &self.layout
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.layout.scale.zoom = zoom.clamp(0.05, 50.0);
    }

    pub fn set_mapping(&mut self, mapping: FrameMapping) {
        self.mapping = mapping;
    }

    fn acquire(&mut self, store: &mut TimelineStore, target: DragTarget) {
        if self.grab.is_some() {
            // A release was lost; finish that drag first.
            self.release(store);
        }
        if !matches!(target, DragTarget::Scrub) {
            store.begin_gesture(target.label());
        }
        tracing::debug!(?target, "Pointer grabbed");
        self.grab = Some(PointerGrab { target, moves: 0 });
    }

    fn release(&mut self, store: &mut TimelineStore) -> bool {
        let Some(grab) = self.grab.take() else {
            return false;
        };
        tracing::debug!(target = ?grab.target, moves = grab.moves, "Pointer released");
        store.commit_gesture()
    }

    /// Pointer pressed on the preview at device coordinates.
    pub fn preview_pointer_down(
        &mut self,
        store: &mut TimelineStore,
        catalog: &MediaCatalog,
        playhead: f64,
        device: Point2D,
    ) -> PointerEffect {
        let point = self.mapping.to_frame(device);
        let frame = self.mapping.frame;
        let Some(id) = hit_test(store.state(), catalog, frame, playhead, point) else {
            self.selection = None;
            return PointerEffect::Nothing;
        };
        self.selection = Some(id);

        let target = match store.state().entity(id) {
            Some(EntityRef::Text(text)) => {
                let (px, py) = frame.to_percent(point);
                DragTarget::MoveOverlay {
                    id,
                    offset: (px - text.x, py - text.y),
                }
            }
            Some(EntityRef::Clip(clip)) => DragTarget::MoveClip {
                id,
                offset: (point.x - clip.transform.x, point.y - clip.transform.y),
                transform: clip.transform,
            },
            None => return PointerEffect::Nothing,
        };
        self.acquire(store, target);
        PointerEffect::Selected(id)
    }

    /// Pointer pressed on the timeline view.
    pub fn timeline_pointer_down(&mut self, store: &mut TimelineStore, x: f64, y: f64) -> PointerEffect {
        match timeline_hit(store.state(), &self.layout, x, y) {
            TimelineHit::Ruler { time } => {
                self.acquire(store, DragTarget::Scrub);
                PointerEffect::Seek(time)
            }
            TimelineHit::Empty { time, .. } => {
                self.selection = None;
                PointerEffect::Seek(time)
            }
            TimelineHit::Entity { id, time, .. } if self.tool == Tool::Razor => {
                match store.execute(EditOp::Split { id, at: time }) {
                    Ok(()) => {
                        self.selection = None;
                        PointerEffect::Edited
                    }
                    Err(err) => PointerEffect::Rejected(err),
                }
            }
            TimelineHit::Entity { id, zone, time } => {
                self.selection = Some(id);
                let start = store.state().entity(id).map_or(0.0, |e| e.start());
                let target = match zone {
                    Zone::Head => DragTarget::TrimHead { id },
                    Zone::Tail => DragTarget::TrimTail { id },
                    Zone::Body => DragTarget::MoveEntity {
                        id,
                        offset: time - start,
                    },
                };
                self.acquire(store, target);
                PointerEffect::Selected(id)
            }
        }
    }

    /// Pointer moved. Routed to the grab if one is held; otherwise ignored.
    /// `x`/`y` are timeline-view pixels for timeline drags and device pixels
    /// for preview drags.
    pub fn pointer_move(&mut self, store: &mut TimelineStore, x: f64, y: f64) -> PointerEffect {
        let Some(grab) = self.grab.as_mut() else {
            return PointerEffect::Nothing;
        };
        grab.moves += 1;
        let time = self.layout.scale.time_at(x);

        let op = match grab.target {
            DragTarget::Scrub => return PointerEffect::Seek(time),
            DragTarget::MoveEntity { id, offset } => EditOp::Move {
                id,
                start: time - offset,
            },
            DragTarget::TrimHead { id } => EditOp::TrimStart { id, at: time },
            DragTarget::TrimTail { id } => EditOp::TrimEnd { id, at: time },
            DragTarget::MoveOverlay { id, offset } => {
                let point = self.mapping.to_frame(Point2D::new(x, y));
                let (px, py) = self.mapping.frame.to_percent(point);
                EditOp::SetTextPosition {
                    id,
                    x: px - offset.0,
                    y: py - offset.1,
                }
            }
            DragTarget::MoveClip {
                id,
                offset,
                transform,
            } => {
                let point = self.mapping.to_frame(Point2D::new(x, y));
                EditOp::SetTransform {
                    id,
                    transform: ClipTransform {
                        x: point.x - offset.0,
                        y: point.y - offset.1,
                        ..transform
                    },
                }
            }
        };

        match store.update_gesture(&op) {
            Ok(()) => PointerEffect::Edited,
            Err(err) => PointerEffect::Rejected(err),
        }
    }

    /// Pointer released anywhere. Ends the drag and commits history.
    pub fn pointer_up(&mut self, store: &mut TimelineStore) -> PointerEffect {
        if self.release(store) {
            PointerEffect::Edited
        } else {
            PointerEffect::Nothing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_project_model::{AssetId, MediaAsset, MediaKind, TextOverlay};
    use std::path::PathBuf;

    fn catalog() -> MediaCatalog {
        let mut asset =
            MediaAsset::with_fallback_metadata(AssetId(0), MediaKind::Video, PathBuf::from("v"));
        asset.width = 1920;
        asset.height = 1080;
        MediaCatalog::from_assets([asset])
    }

    fn store() -> TimelineStore {
        let mut store = TimelineStore::new(&EditorDefaults::default());
        let asset = catalog().get(AssetId(0)).cloned().unwrap();
        store.execute(EditOp::AddClip { asset }).unwrap();
        store
    }

    fn controller() -> InteractionController {
        let frame = FrameSize::new(1920, 1080);
        InteractionController::new(
            TimelineLayout::from_defaults(&EditorDefaults::default()),
            FrameMapping::new(960.0, 540.0, frame),
        )
    }

    // Lane y for the video track in the default layout (second lane).
    const VIDEO_LANE_Y: f64 = 24.0 + 48.0 + 10.0;

    #[test]
    fn test_time_mapping() {
        let scale = TimelineScale {
            pixels_per_second: 50.0,
            zoom: 2.0,
        };
        assert_eq!(scale.time_at(300.0), 3.0);
        assert_eq!(scale.time_at(-20.0), 0.0);
        assert_eq!(scale.x_at(3.0), 300.0);
    }

    #[test]
    fn test_preview_hit_prefers_topmost() {
        let mut store = store();
        store
            .execute(EditOp::AddText {
                text: "Title".into(),
                at: Some(0.0),
                duration: 5.0,
            })
            .unwrap();
        let frame = FrameSize::new(1920, 1080);
        let center = Point2D::new(960.0, 540.0);
        let state = store.state();
        assert_eq!(hit_test(state, &catalog(), frame, 1.0, center), Some(EntityId(2)));
        // Outside the text box only the clip is hit.
        assert_eq!(
            hit_test(state, &catalog(), frame, 1.0, Point2D::new(10.0, 10.0)),
            Some(EntityId(1))
        );
        // Nothing is visible after the end.
        assert_eq!(hit_test(state, &catalog(), frame, 10.0, center), None);
    }

    #[test]
    fn test_timeline_zones() {
        let store = store();
        let layout = TimelineLayout::from_defaults(&EditorDefaults::default());
        // Clip spans 0..10s = 0..500px.
        assert!(matches!(
            timeline_hit(store.state(), &layout, 2.0, VIDEO_LANE_Y),
            TimelineHit::Entity { zone: Zone::Head, .. }
        ));
        assert!(matches!(
            timeline_hit(store.state(), &layout, 250.0, VIDEO_LANE_Y),
            TimelineHit::Entity { zone: Zone::Body, .. }
        ));
        assert!(matches!(
            timeline_hit(store.state(), &layout, 498.0, VIDEO_LANE_Y),
            TimelineHit::Entity { zone: Zone::Tail, .. }
        ));
        assert!(matches!(
            timeline_hit(store.state(), &layout, 100.0, 5.0),
            TimelineHit::Ruler { time } if time == 2.0
        ));
    }

    #[test]
    fn test_body_drag_keeps_pointer_offset_and_pushes_once() {
        let mut store = store();
        let mut ctl = controller();
        // Grab 4s into the clip.
        assert_eq!(
            ctl.timeline_pointer_down(&mut store, 200.0, VIDEO_LANE_Y),
            PointerEffect::Selected(EntityId(1))
        );
        ctl.pointer_move(&mut store, 250.0, VIDEO_LANE_Y);
        // The pointer leaves the lane; the grab still tracks it.
        ctl.pointer_move(&mut store, 300.0, 900.0);
        assert_eq!(store.state().clip(EntityId(1)).unwrap().start, 2.0);
        assert_eq!(store.history().len(), 2);

        assert_eq!(ctl.pointer_up(&mut store), PointerEffect::Edited);
        assert_eq!(store.history().len(), 3);
        assert!(ctl.grab().is_none());
    }

    #[test]
    fn test_tail_drag_trims() {
        let mut store = store();
        let mut ctl = controller();
        ctl.timeline_pointer_down(&mut store, 499.0, VIDEO_LANE_Y);
        ctl.pointer_move(&mut store, 300.0, VIDEO_LANE_Y);
        ctl.pointer_up(&mut store);
        let clip = store.state().clip(EntityId(1)).unwrap();
        assert_eq!((clip.start, clip.end), (0.0, 6.0));
    }

    #[test]
    fn test_razor_splits_on_click() {
        let mut store = store();
        let mut ctl = controller();
        ctl.set_tool(Tool::Razor);
        assert_eq!(
            ctl.timeline_pointer_down(&mut store, 150.0, VIDEO_LANE_Y),
            PointerEffect::Edited
        );
        assert_eq!(store.state().clips.len(), 2);
        assert!(ctl.grab().is_none());
    }

    #[test]
    fn test_overlay_drag_uses_frame_scale() {
        let mut store = TimelineStore::new(&EditorDefaults::default());
        store
            .execute(EditOp::AddText {
                text: "Hi".into(),
                at: None,
                duration: 5.0,
            })
            .unwrap();
        let mut ctl = controller();
        // Device (480, 270) is the frame center on a half-size surface.
        let effect =
            ctl.preview_pointer_down(&mut store, &catalog(), 1.0, Point2D::new(480.0, 270.0));
        assert_eq!(effect, PointerEffect::Selected(EntityId(1)));
        ctl.pointer_move(&mut store, 480.0 + 96.0, 270.0);
        ctl.pointer_up(&mut store);

        let text: &TextOverlay = store.state().text(EntityId(1)).unwrap();
        assert!((text.x - 60.0).abs() < 1e-9);
        assert!((text.y - 50.0).abs() < 1e-9);
        assert_eq!(store.history().len(), 3);
    }

    #[test]
    fn test_ruler_scrub_never_edits() {
        let mut store = store();
        let mut ctl = controller();
        assert_eq!(
            ctl.timeline_pointer_down(&mut store, 100.0, 5.0),
            PointerEffect::Seek(2.0)
        );
        assert_eq!(
            ctl.pointer_move(&mut store, 150.0, 5.0),
            PointerEffect::Seek(3.0)
        );
        assert_eq!(ctl.pointer_up(&mut store), PointerEffect::Nothing);
        assert_eq!(store.history().len(), 2);
    }
}
