//! Edit operations as pure transforms of [`TimelineState`].
//!
//! [`apply`] clones the input, mutates the clone, recomputes the derived
//! duration, and returns it. An edit that leaves the state unchanged is
//! reported as [`EditError::NoOp`] so callers never record it in history.
//!
//! Neighbor selection for rolling and slide edits: an entity on the same
//! track whose edge lies within `min_clip_secs` of the edited edge. When
//! several qualify, the closest wins; remaining ties go to the oldest id.

use montage_common::EditorDefaults;
use montage_project_model::{
    Clip, ClipTransform, Crop, Entity, EntityId, Filter, FontWeight, MediaAsset, TextAlign,
    TextAnimation, TextOverlay, Timed, TimelineState, TrackKind, TrackMix, TransitionKind,
    TransitionSpec,
};

use crate::error::EditError;

/// Slack for "at or after" comparisons between edge times.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Tunables shared by all edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditParams {
    /// Minimum entity length (ε), also the adjacency window.
    pub min_clip_secs: f64,
    /// Gap between an entity and its duplicate.
    pub duplicate_gap_secs: f64,
}

impl Default for EditParams {
    fn default() -> Self {
        Self {
            min_clip_secs: 0.1,
            duplicate_gap_secs: 0.0,
        }
    }
}

impl From<&EditorDefaults> for EditParams {
    fn from(defaults: &EditorDefaults) -> Self {
        Self {
            min_clip_secs: defaults.min_clip_secs.max(f64::EPSILON),
            duplicate_gap_secs: defaults.duplicate_gap_secs.max(0.0),
        }
    }
}

/// Optional changes to a text overlay's content and style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPatch {
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
    pub font_family: Option<String>,
    pub font_weight: Option<FontWeight>,
    pub text_align: Option<TextAlign>,
    pub background_color: Option<Option<String>>,
    pub opacity: Option<f64>,
    pub animation: Option<TextAnimation>,
}

/// Direction of a layer swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerDirection {
    Up,
    Down,
}

/// Every mutation the Timeline Store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    AddClip {
        asset: MediaAsset,
    },
    AddText {
        text: String,
        /// `None` appends after the last text overlay.
        at: Option<f64>,
        duration: f64,
    },
    Split {
        id: EntityId,
        at: f64,
    },
    Duplicate {
        id: EntityId,
    },
    Move {
        id: EntityId,
        start: f64,
    },
    TrimStart {
        id: EntityId,
        at: f64,
    },
    TrimEnd {
        id: EntityId,
        at: f64,
    },
    RippleTrimEnd {
        id: EntityId,
        at: f64,
    },
    RollingTrimEnd {
        id: EntityId,
        at: f64,
    },
    Slide {
        id: EntityId,
        start: f64,
    },
    Layer {
        id: EntityId,
        direction: LayerDirection,
    },
    Delete {
        id: EntityId,
    },
    RippleDelete {
        id: EntityId,
    },
    SetFilters {
        id: EntityId,
        filters: Vec<Filter>,
    },
    SetTransform {
        id: EntityId,
        transform: ClipTransform,
    },
    SetCrop {
        id: EntityId,
        crop: Crop,
    },
    SetVolume {
        id: EntityId,
        volume: f64,
    },
    SetSpeed {
        id: EntityId,
        speed: f64,
    },
    SetVisible {
        id: EntityId,
        visible: bool,
    },
    UpdateText {
        id: EntityId,
        patch: TextPatch,
    },
    SetTextPosition {
        id: EntityId,
        x: f64,
        y: f64,
    },
    AddTransition {
        kind: TransitionKind,
        duration_ms: u32,
        from: EntityId,
        to: EntityId,
    },
    RemoveTransition {
        id: EntityId,
    },
    SetTrackMix {
        mix: TrackMix,
    },
}

impl EditOp {
    /// Short label used for history entries and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddClip { .. } => "Add clip",
            Self::AddText { .. } => "Add text",
            Self::Split { .. } => "Split",
            Self::Duplicate { .. } => "Duplicate",
            Self::Move { .. } => "Move",
            Self::TrimStart { .. } => "Trim start",
            Self::TrimEnd { .. } => "Trim end",
            Self::RippleTrimEnd { .. } => "Ripple trim",
            Self::RollingTrimEnd { .. } => "Rolling trim",
            Self::Slide { .. } => "Slide",
            Self::Layer {
                direction: LayerDirection::Up,
                ..
            } => "Layer up",
            Self::Layer {
                direction: LayerDirection::Down,
                ..
            } => "Layer down",
            Self::Delete { .. } => "Delete",
            Self::RippleDelete { .. } => "Ripple delete",
            Self::SetFilters { .. } => "Set filters",
            Self::SetTransform { .. } => "Set transform",
            Self::SetCrop { .. } => "Set crop",
            Self::SetVolume { .. } => "Set volume",
            Self::SetSpeed { .. } => "Set speed",
            Self::SetVisible { .. } => "Set visibility",
            Self::UpdateText { .. } => "Edit text",
            Self::SetTextPosition { .. } => "Move text",
            Self::AddTransition { .. } => "Add transition",
            Self::RemoveTransition { .. } => "Remove transition",
            Self::SetTrackMix { .. } => "Track mix",
        }
    }

    /// The entity this edit targets, if any.
    pub fn target(&self) -> Option<EntityId> {
        match self {
            Self::Split { id, .. }
            | Self::Duplicate { id }
            | Self::Move { id, .. }
            | Self::TrimStart { id, .. }
            | Self::TrimEnd { id, .. }
            | Self::RippleTrimEnd { id, .. }
            | Self::RollingTrimEnd { id, .. }
            | Self::Slide { id, .. }
            | Self::Layer { id, .. }
            | Self::Delete { id }
            | Self::RippleDelete { id }
            | Self::SetFilters { id, .. }
            | Self::SetTransform { id, .. }
            | Self::SetCrop { id, .. }
            | Self::SetVolume { id, .. }
            | Self::SetSpeed { id, .. }
            | Self::SetVisible { id, .. }
            | Self::UpdateText { id, .. }
            | Self::SetTextPosition { id, .. } => Some(*id),
            Self::AddTransition { to, .. } => Some(*to),
            Self::RemoveTransition { .. }
            | Self::AddClip { .. }
            | Self::AddText { .. }
            | Self::SetTrackMix { .. } => None,
        }
    }
}

/// Apply one edit, returning the new state.
pub fn apply(
    state: &TimelineState,
    op: &EditOp,
    params: &EditParams,
) -> Result<TimelineState, EditError> {
    let eps = params.min_clip_secs;
    let mut next = state.clone();

    match op {
        EditOp::AddClip { asset } => add_clip(&mut next, asset)?,
        EditOp::AddText { text, at, duration } => {
            add_text(&mut next, text, *at, *duration, eps)?
        }
        EditOp::Split { id, at } => split(&mut next, *id, finite(*at)?)?,
        EditOp::Duplicate { id } => duplicate(&mut next, *id, params.duplicate_gap_secs)?,
        EditOp::Move { id, start } => move_to(&mut next, *id, finite(*start)?)?,
        EditOp::TrimStart { id, at } => trim_start(&mut next, *id, finite(*at)?, eps)?,
        EditOp::TrimEnd { id, at } => trim_end(&mut next, *id, finite(*at)?, eps)?,
        EditOp::RippleTrimEnd { id, at } => ripple_trim_end(&mut next, *id, finite(*at)?, eps)?,
        EditOp::RollingTrimEnd { id, at } => {
            rolling_trim_end(&mut next, *id, finite(*at)?, eps)?
        }
        EditOp::Slide { id, start } => slide(&mut next, *id, finite(*start)?, eps)?,
        EditOp::Layer { id, direction } => swap_layer(&mut next, *id, *direction)?,
        EditOp::Delete { id } => {
            next.remove_entity(*id).ok_or(EditError::NotFound(*id))?;
        }
        EditOp::RippleDelete { id } => ripple_delete(&mut next, *id)?,
        EditOp::SetFilters { id, filters } => {
            clip_mut(&mut next, *id)?.filters = filters.clone();
        }
        EditOp::SetTransform { id, transform } => {
            clip_mut(&mut next, *id)?.transform = *transform;
        }
        EditOp::SetCrop { id, crop } => {
            clip_mut(&mut next, *id)?.crop = Crop {
                x: crop.x.clamp(-50.0, 50.0),
                y: crop.y.clamp(-50.0, 50.0),
                width: crop.width.clamp(1.0, 100.0),
                height: crop.height.clamp(1.0, 100.0),
            };
        }
        EditOp::SetVolume { id, volume } => {
            clip_mut(&mut next, *id)?.volume = finite(*volume)?.clamp(0.0, 2.0);
        }
        EditOp::SetSpeed { id, speed } => clip_mut(&mut next, *id)?.set_speed(finite(*speed)?),
        EditOp::SetVisible { id, visible } => set_visible(&mut next, *id, *visible)?,
        EditOp::UpdateText { id, patch } => update_text(text_mut(&mut next, *id)?, patch),
        EditOp::SetTextPosition { id, x, y } => {
            text_mut(&mut next, *id)?.set_position(finite(*x)?, finite(*y)?)
        }
        EditOp::AddTransition {
            kind,
            duration_ms,
            from,
            to,
        } => add_transition(&mut next, *kind, *duration_ms, *from, *to)?,
        EditOp::RemoveTransition { id } => {
            let before = next.transitions.len();
            next.transitions.retain(|t| t.id != *id);
            if next.transitions.len() == before {
                return Err(EditError::NotFound(*id));
            }
        }
        EditOp::SetTrackMix { mix } => next.set_track_mix(TrackMix {
            volume: finite(mix.volume)?.max(0.0),
            ..*mix
        }),
    }

    next.recompute_duration();
    if next == *state {
        return Err(EditError::NoOp);
    }
    Ok(next)
}

fn finite(value: f64) -> Result<f64, EditError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EditError::InvalidRange(format!("{value} is not a finite value")))
    }
}

fn require(state: &TimelineState, id: EntityId) -> Result<Entity, EditError> {
    state
        .entity(id)
        .map(|e| e.to_entity())
        .ok_or(EditError::NotFound(id))
}

fn clip_mut(state: &mut TimelineState, id: EntityId) -> Result<&mut Clip, EditError> {
    if state.text(id).is_some() {
        return Err(EditError::WrongEntityKind {
            id,
            expected: "clip",
        });
    }
    state.clip_mut(id).ok_or(EditError::NotFound(id))
}

fn text_mut(state: &mut TimelineState, id: EntityId) -> Result<&mut TextOverlay, EditError> {
    if state.clip(id).is_some() {
        return Err(EditError::WrongEntityKind {
            id,
            expected: "text overlay",
        });
    }
    state.text_mut(id).ok_or(EditError::NotFound(id))
}

fn add_clip(state: &mut TimelineState, asset: &MediaAsset) -> Result<(), EditError> {
    if !(asset.duration_seconds.is_finite() && asset.duration_seconds > 0.0) {
        return Err(EditError::InvalidRange(format!(
            "{} has no playable duration",
            asset.name
        )));
    }
    let start = state.track_end(TrackKind::from(asset.kind));
    let z = state.next_z();
    let id = state.allocate_id();
    state.clips.push(Clip::from_asset(id, asset, start, z));
    Ok(())
}

fn add_text(
    state: &mut TimelineState,
    text: &str,
    at: Option<f64>,
    duration: f64,
    eps: f64,
) -> Result<(), EditError> {
    if !(duration.is_finite() && duration >= eps) {
        return Err(EditError::InvalidRange(format!(
            "text duration {duration} is shorter than {eps}"
        )));
    }
    let start = match at {
        Some(t) => finite(t)?.max(0.0),
        None => state.track_end(TrackKind::Text),
    };
    let z = state.next_z();
    let id = state.allocate_id();
    state
        .text_overlays
        .push(TextOverlay::new(id, text, start, start + duration, z));
    Ok(())
}

fn split(state: &mut TimelineState, id: EntityId, at: f64) -> Result<(), EditError> {
    let original = require(state, id)?;
    let (start, end) = (original.start(), original.end());
    if !(start < at && at < end) {
        return Err(EditError::InvalidSplitPoint { at, start, end });
    }

    // The tail sits directly above the head; anything already there moves up one.
    let head_z = original.z_index();
    if state
        .entities()
        .any(|e| e.id() != id && e.z_index() == head_z + 1)
    {
        for mut e in state.entities_mut() {
            if e.id() != id && e.z_index() > head_z {
                let z = e.z_index();
                e.set_z_index(z + 1);
            }
        }
    }

    let first_id = state.allocate_id();
    let second_id = state.allocate_id();
    let (first, mut second) = match original {
        Entity::Clip(clip) => {
            let cut = clip.trim_start + (at - clip.start);
            let mut head = clip.clone();
            head.id = first_id;
            head.end = at;
            head.trim_end = cut;
            let mut tail = clip;
            tail.id = second_id;
            tail.start = at;
            tail.trim_start = cut;
            (Entity::Clip(head), Entity::Clip(tail))
        }
        Entity::Text(text) => {
            let mut head = text.clone();
            head.id = first_id;
            head.end = at;
            let mut tail = text;
            tail.id = second_id;
            tail.start = at;
            (Entity::Text(head), Entity::Text(tail))
        }
    };

    // The incoming transition stays on the head, the outgoing one moves to the tail.
    for t in &mut state.transitions {
        if t.to == id {
            t.to = first_id;
        }
        if t.from == id {
            t.from = second_id;
        }
    }
    second.set_z_index(head_z + 1);
    state.remove_entity(id);
    state.insert(first);
    state.insert(second);
    Ok(())
}

fn duplicate(state: &mut TimelineState, id: EntityId, gap: f64) -> Result<(), EditError> {
    let mut copy = require(state, id)?;
    copy.set_id(state.allocate_id());
    copy.set_z_index(state.next_z());
    let offset = copy.end() + gap - copy.start();
    copy.shift(offset);
    state.insert(copy);
    Ok(())
}

fn move_to(state: &mut TimelineState, id: EntityId, start: f64) -> Result<(), EditError> {
    let mut entity = state.entity_mut(id).ok_or(EditError::NotFound(id))?;
    let delta = start.max(0.0) - entity.start();
    entity.shift(delta);
    Ok(())
}

fn trim_start(state: &mut TimelineState, id: EntityId, at: f64, eps: f64) -> Result<(), EditError> {
    let mut entity = state.entity_mut(id).ok_or(EditError::NotFound(id))?;
    let lo = entity.min_head();
    let hi = entity.end() - eps;
    if hi >= lo {
        entity.set_head(at.clamp(lo, hi));
    }
    Ok(())
}

/// Clamp a requested right edge to `[start + eps, max_tail]`.
fn clamp_tail<E: Timed>(entity: &E, at: f64, eps: f64) -> Option<f64> {
    let lo = entity.start() + eps;
    let hi = entity.max_tail().unwrap_or(f64::INFINITY);
    (hi >= lo).then(|| at.clamp(lo, hi))
}

fn trim_end(state: &mut TimelineState, id: EntityId, at: f64, eps: f64) -> Result<(), EditError> {
    let mut entity = state.entity_mut(id).ok_or(EditError::NotFound(id))?;
    if let Some(end) = clamp_tail(&entity, at, eps) {
        entity.set_tail(end);
    }
    Ok(())
}

fn ripple_trim_end(
    state: &mut TimelineState,
    id: EntityId,
    at: f64,
    eps: f64,
) -> Result<(), EditError> {
    let (track, old_end, new_end) = {
        let mut entity = state.entity_mut(id).ok_or(EditError::NotFound(id))?;
        let old_end = entity.end();
        let Some(new_end) = clamp_tail(&entity, at, eps) else {
            return Ok(());
        };
        entity.set_tail(new_end);
        (entity.track(), old_end, new_end)
    };

    let delta = new_end - old_end;
    for mut other in state.entities_mut() {
        if other.id() != id && other.track() == track && other.start() >= old_end - EDGE_TOLERANCE
        {
            other.shift(delta);
        }
    }
    Ok(())
}

/// Neighbor on `track` whose chosen edge is within `eps` of `edge`.
fn adjacent(
    state: &TimelineState,
    track: TrackKind,
    exclude: EntityId,
    edge: f64,
    eps: f64,
    edge_of: impl Fn(f64, f64) -> f64,
) -> Option<EntityId> {
    state
        .entities()
        .filter(|e| e.id() != exclude && e.track() == track)
        .map(|e| ((edge_of(e.start(), e.end()) - edge).abs(), e.id()))
        .filter(|(distance, _)| *distance <= eps + EDGE_TOLERANCE)
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, id)| id)
}

fn rolling_trim_end(
    state: &mut TimelineState,
    id: EntityId,
    at: f64,
    eps: f64,
) -> Result<(), EditError> {
    let target = require(state, id)?;
    let old_end = target.end();
    let Some(neighbor_id) = adjacent(state, target.track(), id, old_end, eps, |start, _| start)
    else {
        return trim_end(state, id, at, eps);
    };
    let neighbor = require(state, neighbor_id)?;

    // Both sides keep at least eps and stay inside their sources.
    let lo = (target.start() + eps - old_end).max(neighbor.min_head() - neighbor.start());
    let hi = (neighbor.end() - eps - neighbor.start())
        .min(target.max_tail().map_or(f64::INFINITY, |m| m - old_end));
    if lo > hi {
        return Ok(());
    }
    let delta = (at - old_end).clamp(lo, hi);

    if let Some(mut e) = state.entity_mut(id) {
        e.set_tail(old_end + delta);
    }
    if let Some(mut n) = state.entity_mut(neighbor_id) {
        let head = n.start() + delta;
        n.set_head(head);
    }
    Ok(())
}

fn slide(state: &mut TimelineState, id: EntityId, start: f64, eps: f64) -> Result<(), EditError> {
    let target = require(state, id)?;
    let (old_start, old_end, track) = (target.start(), target.end(), target.track());
    let prev = adjacent(state, track, id, old_start, eps, |_, end| end);
    let next = adjacent(state, track, id, old_end, eps, |start, _| start)
        .filter(|n| Some(*n) != prev);

    if prev.is_none() && next.is_none() {
        return move_to(state, id, start);
    }

    let mut lo = -old_start;
    let mut hi = f64::INFINITY;
    if let Some(p) = prev.map(|p| require(state, p)).transpose()? {
        lo = lo.max(p.start() + eps - old_start);
        if let Some(max_tail) = p.max_tail() {
            hi = hi.min(max_tail - old_start);
        }
    }
    if let Some(n) = next.map(|n| require(state, n)).transpose()? {
        lo = lo.max(n.min_head() - old_end);
        hi = hi.min(n.end() - eps - old_end);
    }
    if lo > hi {
        return Ok(());
    }
    let delta = (start - old_start).clamp(lo, hi);

    if let Some(mut e) = state.entity_mut(id) {
        e.shift(delta);
    }
    if let Some(mut p) = prev.and_then(|p| state.entity_mut(p)) {
        p.set_tail(old_start + delta);
    }
    if let Some(mut n) = next.and_then(|n| state.entity_mut(n)) {
        n.set_head(old_end + delta);
    }
    Ok(())
}

fn swap_layer(
    state: &mut TimelineState,
    id: EntityId,
    direction: LayerDirection,
) -> Result<(), EditError> {
    let order: Vec<(i64, EntityId)> = state.layers().iter().map(|e| e.layer_key()).collect();
    let pos = order
        .iter()
        .position(|(_, eid)| *eid == id)
        .ok_or(EditError::NotFound(id))?;
    let other = match direction {
        LayerDirection::Up if pos + 1 < order.len() => pos + 1,
        LayerDirection::Down if pos > 0 => pos - 1,
        _ => return Ok(()),
    };

    let (z_target, target_id) = order[pos];
    let (z_other, other_id) = order[other];
    if let Some(mut e) = state.entity_mut(target_id) {
        e.set_z_index(z_other);
    }
    if let Some(mut e) = state.entity_mut(other_id) {
        e.set_z_index(z_target);
    }
    Ok(())
}

fn ripple_delete(state: &mut TimelineState, id: EntityId) -> Result<(), EditError> {
    let removed = state.remove_entity(id).ok_or(EditError::NotFound(id))?;
    let (track, end, length) = (removed.track(), removed.end(), removed.duration());
    for mut other in state.entities_mut() {
        if other.track() == track && other.start() >= end - EDGE_TOLERANCE {
            other.shift(-length);
        }
    }
    Ok(())
}

fn set_visible(state: &mut TimelineState, id: EntityId, visible: bool) -> Result<(), EditError> {
    if let Some(clip) = state.clip_mut(id) {
        clip.visible = visible;
    } else if let Some(text) = state.text_mut(id) {
        text.visible = visible;
    } else {
        return Err(EditError::NotFound(id));
    }
    Ok(())
}

fn update_text(overlay: &mut TextOverlay, patch: &TextPatch) {
    if let Some(text) = &patch.text {
        overlay.text = text.clone();
    }
    if let Some(size) = patch.font_size.filter(|s| s.is_finite()) {
        overlay.font_size = size.clamp(4.0, 512.0);
    }
    if let Some(color) = &patch.color {
        overlay.color = color.clone();
    }
    if let Some(family) = &patch.font_family {
        overlay.font_family = family.clone();
    }
    if let Some(weight) = patch.font_weight {
        overlay.font_weight = weight;
    }
    if let Some(align) = patch.text_align {
        overlay.text_align = align;
    }
    if let Some(background) = &patch.background_color {
        overlay.background_color = background.clone();
    }
    if let Some(opacity) = patch.opacity.filter(|o| o.is_finite()) {
        overlay.opacity = opacity.clamp(0.0, 1.0);
    }
    if let Some(animation) = patch.animation {
        overlay.animation = animation;
    }
}

fn add_transition(
    state: &mut TimelineState,
    kind: TransitionKind,
    duration_ms: u32,
    from: EntityId,
    to: EntityId,
) -> Result<(), EditError> {
    if from == to {
        return Err(EditError::InvalidRange(
            "a transition needs two different entities".to_string(),
        ));
    }
    if duration_ms == 0 {
        return Err(EditError::InvalidRange(
            "transition duration must be positive".to_string(),
        ));
    }
    require(state, from)?;
    let incoming = require(state, to)?;
    // Never longer than the clip it plays over.
    let max_ms = (incoming.duration() * 1000.0).floor().max(1.0) as u32;

    state.transitions.retain(|t| t.to != to);
    let id = state.allocate_id();
    state.transitions.push(TransitionSpec {
        id,
        kind,
        duration_ms: duration_ms.min(max_ms),
        from,
        to,
    });
    Ok(())
}
