//! Timeline state: the aggregate every edit operation transforms.
//!
//! Clips and text overlays share one id space and one z-order. Derived
//! values (`duration`, layer order, visibility) are recomputed by explicit
//! calls rather than cached behind the caller's back.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetId, MediaKind};
use crate::clip::Clip;
use crate::text::TextOverlay;
use crate::transition::TransitionSpec;

/// Identifier shared by clips, text overlays and transitions.
///
/// Ids are allocated monotonically, so comparing ids compares creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The lane an entity lives on. Ripple and add operate per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Image,
    Text,
}

impl From<MediaKind> for TrackKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => Self::Video,
            MediaKind::Audio => Self::Audio,
            MediaKind::Image => Self::Image,
        }
    }
}

/// Mix settings for one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackMix {
    pub track: TrackKind,
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
}

impl TrackMix {
    pub fn unity(track: TrackKind) -> Self {
        Self {
            track,
            volume: 1.0,
            muted: false,
        }
    }

    /// Gain contributed by this track (0 when muted).
    pub fn gain(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume.max(0.0)
        }
    }
}

/// Shared temporal and layering behavior of timeline entities.
pub trait Timed {
    fn id(&self) -> EntityId;
    fn start(&self) -> f64;
    fn end(&self) -> f64;
    fn z_index(&self) -> i64;
    fn set_z_index(&mut self, z: i64);
    fn track(&self) -> TrackKind;
    fn is_visible_at(&self, t: f64) -> bool;

    /// Move the whole span by `delta`; the source window is unchanged.
    fn shift(&mut self, delta: f64);

    /// Move the left edge to `start`. Clips advance `trim_start` by the same amount.
    fn set_head(&mut self, start: f64);

    /// Move the right edge to `end`. Clips move `trim_end` by the same amount.
    fn set_tail(&mut self, end: f64);

    /// Earliest timeline position the left edge may reach without running
    /// out of source material (never below zero).
    fn min_head(&self) -> f64;

    /// Latest position the right edge may reach; `None` when unbounded.
    fn max_tail(&self) -> Option<f64>;

    fn duration(&self) -> f64 {
        self.end() - self.start()
    }
}

impl Timed for Clip {
    fn id(&self) -> EntityId {
        self.id
    }
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
    fn z_index(&self) -> i64 {
        self.z_index
    }
    fn set_z_index(&mut self, z: i64) {
        self.z_index = z;
    }
    fn track(&self) -> TrackKind {
        Clip::track(self)
    }
    fn is_visible_at(&self, t: f64) -> bool {
        Clip::is_visible_at(self, t)
    }
    fn shift(&mut self, delta: f64) {
        self.start += delta;
        self.end += delta;
    }
    fn set_head(&mut self, start: f64) {
        let delta = start - self.start;
        self.start = start;
        self.trim_start += delta;
    }
    fn set_tail(&mut self, end: f64) {
        let delta = end - self.end;
        self.end = end;
        self.trim_end += delta;
    }
    fn min_head(&self) -> f64 {
        match self.kind {
            MediaKind::Image => 0.0,
            MediaKind::Video | MediaKind::Audio => (self.start - self.trim_start).max(0.0),
        }
    }
    fn max_tail(&self) -> Option<f64> {
        self.source_limit()
            .map(|limit| self.end + (limit - self.trim_end).max(0.0))
    }
}

impl Timed for TextOverlay {
    fn id(&self) -> EntityId {
        self.id
    }
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
    fn z_index(&self) -> i64 {
        self.z_index
    }
    fn set_z_index(&mut self, z: i64) {
        self.z_index = z;
    }
    fn track(&self) -> TrackKind {
        TrackKind::Text
    }
    fn is_visible_at(&self, t: f64) -> bool {
        TextOverlay::is_visible_at(self, t)
    }
    fn shift(&mut self, delta: f64) {
        self.start += delta;
        self.end += delta;
    }
    fn set_head(&mut self, start: f64) {
        self.start = start;
    }
    fn set_tail(&mut self, end: f64) {
        self.end = end;
    }
    fn min_head(&self) -> f64 {
        0.0
    }
    fn max_tail(&self) -> Option<f64> {
        None
    }
}

/// An owned timeline entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Clip(Clip),
    Text(TextOverlay),
}

/// Borrowed view of a timeline entity.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Clip(&'a Clip),
    Text(&'a TextOverlay),
}

/// Mutable view of a timeline entity.
#[derive(Debug)]
pub enum EntityMut<'a> {
    Clip(&'a mut Clip),
    Text(&'a mut TextOverlay),
}

impl Timed for EntityMut<'_> {
    fn id(&self) -> EntityId {
        match self {
            Self::Clip(c) => c.id,
            Self::Text(t) => t.id,
        }
    }
    fn start(&self) -> f64 {
        match self {
            Self::Clip(c) => c.start,
            Self::Text(t) => t.start,
        }
    }
    fn end(&self) -> f64 {
        match self {
            Self::Clip(c) => c.end,
            Self::Text(t) => t.end,
        }
    }
    fn z_index(&self) -> i64 {
        match self {
            Self::Clip(c) => c.z_index,
            Self::Text(t) => t.z_index,
        }
    }
    fn set_z_index(&mut self, z: i64) {
        match self {
            Self::Clip(c) => c.z_index = z,
            Self::Text(t) => t.z_index = z,
        }
    }
    fn track(&self) -> TrackKind {
        match self {
            Self::Clip(c) => c.track(),
            Self::Text(_) => TrackKind::Text,
        }
    }
    fn is_visible_at(&self, at: f64) -> bool {
        match self {
            Self::Clip(c) => c.is_visible_at(at),
            Self::Text(t) => t.is_visible_at(at),
        }
    }
    fn shift(&mut self, delta: f64) {
        match self {
            Self::Clip(c) => Timed::shift(&mut **c, delta),
            Self::Text(t) => Timed::shift(&mut **t, delta),
        }
    }
    fn set_head(&mut self, start: f64) {
        match self {
            Self::Clip(c) => Timed::set_head(&mut **c, start),
            Self::Text(t) => Timed::set_head(&mut **t, start),
        }
    }
    fn set_tail(&mut self, end: f64) {
        match self {
            Self::Clip(c) => Timed::set_tail(&mut **c, end),
            Self::Text(t) => Timed::set_tail(&mut **t, end),
        }
    }
    fn min_head(&self) -> f64 {
        match self {
            Self::Clip(c) => Timed::min_head(&**c),
            Self::Text(t) => Timed::min_head(&**t),
        }
    }
    fn max_tail(&self) -> Option<f64> {
        match self {
            Self::Clip(c) => Timed::max_tail(&**c),
            Self::Text(t) => Timed::max_tail(&**t),
        }
    }
}

impl Timed for Entity {
    fn id(&self) -> EntityId {
        self.view().id()
    }
    fn start(&self) -> f64 {
        self.view().start()
    }
    fn end(&self) -> f64 {
        self.view().end()
    }
    fn z_index(&self) -> i64 {
        self.view().z_index()
    }
    fn set_z_index(&mut self, z: i64) {
        self.view_mut().set_z_index(z)
    }
    fn track(&self) -> TrackKind {
        self.view().track()
    }
    fn is_visible_at(&self, t: f64) -> bool {
        self.view().is_visible_at(t)
    }
    fn shift(&mut self, delta: f64) {
        self.view_mut().shift(delta)
    }
    fn set_head(&mut self, start: f64) {
        self.view_mut().set_head(start)
    }
    fn set_tail(&mut self, end: f64) {
        self.view_mut().set_tail(end)
    }
    fn min_head(&self) -> f64 {
        self.view().min_head()
    }
    fn max_tail(&self) -> Option<f64> {
        self.view().max_tail()
    }
}

impl Entity {
    pub fn view(&self) -> EntityRef<'_> {
        match self {
            Self::Clip(c) => EntityRef::Clip(c),
            Self::Text(t) => EntityRef::Text(t),
        }
    }

    pub fn view_mut(&mut self) -> EntityMut<'_> {
        match self {
            Self::Clip(c) => EntityMut::Clip(c),
            Self::Text(t) => EntityMut::Text(t),
        }
    }

    /// Replace the id, used when an entity is cloned into a new one.
    pub fn set_id(&mut self, id: EntityId) {
        match self {
            Self::Clip(c) => c.id = id,
            Self::Text(t) => t.id = id,
        }
    }
}

impl<'a> EntityRef<'a> {
    pub fn id(&self) -> EntityId {
        match self {
            Self::Clip(c) => c.id,
            Self::Text(t) => t.id,
        }
    }

    pub fn start(&self) -> f64 {
        match self {
            Self::Clip(c) => c.start,
            Self::Text(t) => t.start,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            Self::Clip(c) => c.end,
            Self::Text(t) => t.end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    pub fn z_index(&self) -> i64 {
        match self {
            Self::Clip(c) => c.z_index,
            Self::Text(t) => t.z_index,
        }
    }

    pub fn track(&self) -> TrackKind {
        match self {
            Self::Clip(c) => c.track(),
            Self::Text(_) => TrackKind::Text,
        }
    }

    pub fn is_visible_at(&self, t: f64) -> bool {
        match self {
            Self::Clip(c) => c.is_visible_at(t),
            Self::Text(o) => o.is_visible_at(t),
        }
    }

    pub fn min_head(&self) -> f64 {
        match self {
            Self::Clip(c) => Timed::min_head(*c),
            Self::Text(t) => Timed::min_head(*t),
        }
    }

    pub fn max_tail(&self) -> Option<f64> {
        match self {
            Self::Clip(c) => Timed::max_tail(*c),
            Self::Text(t) => Timed::max_tail(*t),
        }
    }

    /// Layer sort key: zIndex, then creation order.
    pub fn layer_key(&self) -> (i64, EntityId) {
        (self.z_index(), self.id())
    }

    pub fn to_entity(&self) -> Entity {
        match self {
            Self::Clip(c) => Entity::Clip((*c).clone()),
            Self::Text(t) => Entity::Text((*t).clone()),
        }
    }
}

/// The authoritative collection of timeline entities plus derived duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineState {
    #[serde(default)]
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
    #[serde(default)]
    pub audio_tracks: Vec<TrackMix>,
    /// `max(end over all entities, 0)`.
    #[serde(default)]
    pub duration: f64,
    /// Next id handed out by [`TimelineState::allocate_id`].
    #[serde(default)]
    pub next_id: u64,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineState {
    pub fn new() -> Self {
        Self {
            clips: Vec::new(),
            text_overlays: Vec::new(),
            transitions: Vec::new(),
            audio_tracks: Vec::new(),
            duration: 0.0,
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Make sure `next_id` is past every id in use, e.g. after loading a
    /// document written by hand.
    pub fn normalize_ids(&mut self) {
        let max_used = self
            .entities()
            .map(|e| e.id().0)
            .chain(self.transitions.iter().map(|t| t.id.0))
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_used + 1);
    }

    /// Recompute the derived duration. Call after every mutation.
    pub fn recompute_duration(&mut self) {
        self.duration = self.entities().map(|e| e.end()).fold(0.0, f64::max);
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty() && self.text_overlays.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.clips.len() + self.text_overlays.len()
    }

    /// All entities, clips first then text overlays.
    pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> {
        self.clips
            .iter()
            .map(EntityRef::Clip)
            .chain(self.text_overlays.iter().map(EntityRef::Text))
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = EntityMut<'_>> {
        self.clips
            .iter_mut()
            .map(EntityMut::Clip)
            .chain(self.text_overlays.iter_mut().map(EntityMut::Text))
    }

    pub fn entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.entities().find(|e| e.id() == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        self.entities_mut().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    pub fn clip(&self, id: EntityId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: EntityId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub fn text(&self, id: EntityId) -> Option<&TextOverlay> {
        self.text_overlays.iter().find(|t| t.id == id)
    }

    pub fn text_mut(&mut self, id: EntityId) -> Option<&mut TextOverlay> {
        self.text_overlays.iter_mut().find(|t| t.id == id)
    }

    /// Every entity in paint order (lowest zIndex first, ties by creation).
    pub fn layers(&self) -> Vec<EntityRef<'_>> {
        let mut all: Vec<_> = self.entities().collect();
        all.sort_by_key(|e| e.layer_key());
        all
    }

    /// Entities with `start <= t < end` that are not hidden, in paint order.
    pub fn visible_at(&self, t: f64) -> Vec<EntityRef<'_>> {
        let mut visible: Vec<_> = self.entities().filter(|e| e.is_visible_at(t)).collect();
        visible.sort_by_key(|e| e.layer_key());
        visible
    }

    /// `max(end)` over entities on `track`, or 0 if the track is empty.
    pub fn track_end(&self, track: TrackKind) -> f64 {
        self.entities()
            .filter(|e| e.track() == track)
            .map(|e| e.end())
            .fold(0.0, f64::max)
    }

    pub fn max_z(&self) -> Option<i64> {
        self.entities().map(|e| e.z_index()).max()
    }

    /// zIndex for a newly created top-most entity.
    pub fn next_z(&self) -> i64 {
        self.max_z().map_or(0, |z| z + 1)
    }

    /// Give every entity a distinct zIndex, keeping paint order. Only touches
    /// the stack when two entities share a value; returns whether it did.
    pub fn spread_tied_layers(&mut self) -> bool {
        let mut zs: Vec<i64> = self.entities().map(|e| e.z_index()).collect();
        zs.sort_unstable();
        if zs.windows(2).all(|w| w[0] != w[1]) {
            return false;
        }
        let order: Vec<EntityId> = self.layers().iter().map(|e| e.id()).collect();
        for (z, id) in order.into_iter().enumerate() {
            if let Some(mut e) = self.entity_mut(id) {
                e.set_z_index(z as i64);
            }
        }
        true
    }

    /// Insert an owned entity as-is.
    pub fn insert(&mut self, entity: Entity) {
        match entity {
            Entity::Clip(c) => self.clips.push(c),
            Entity::Text(t) => self.text_overlays.push(t),
        }
    }

    /// Remove an entity and any transition that references it.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let removed = if let Some(pos) = self.clips.iter().position(|c| c.id == id) {
            Some(Entity::Clip(self.clips.remove(pos)))
        } else {
            self.text_overlays
                .iter()
                .position(|t| t.id == id)
                .map(|pos| Entity::Text(self.text_overlays.remove(pos)))
        };
        if removed.is_some() {
            self.transitions.retain(|t| !t.references(id));
        }
        removed
    }

    /// Remove every clip that uses `asset`. Returns the removed clip ids.
    pub fn remove_asset_clips(&mut self, asset: AssetId) -> Vec<EntityId> {
        let ids: Vec<_> = self
            .clips
            .iter()
            .filter(|c| c.asset_id == asset)
            .map(|c| c.id)
            .collect();
        for id in &ids {
            self.remove_entity(*id);
        }
        ids
    }

    /// Ids of the entities on `track`, excluding `except`.
    pub fn track_ids(&self, track: TrackKind, except: Option<EntityId>) -> Vec<EntityId> {
        self.entities()
            .filter(|e| e.track() == track && Some(e.id()) != except)
            .map(|e| e.id())
            .collect()
    }

    /// Mix settings for `track`, defaulting to unity gain.
    pub fn track_mix(&self, track: TrackKind) -> TrackMix {
        self.audio_tracks
            .iter()
            .find(|m| m.track == track)
            .copied()
            .unwrap_or_else(|| TrackMix::unity(track))
    }

    pub fn set_track_mix(&mut self, mix: TrackMix) {
        match self.audio_tracks.iter_mut().find(|m| m.track == mix.track) {
            Some(existing) => *existing = mix,
            None => self.audio_tracks.push(mix),
        }
    }

    /// The transition that plays into `id`, if any.
    pub fn transition_into(&self, id: EntityId) -> Option<&TransitionSpec> {
        self.transitions.iter().find(|t| t.to == id)
    }

    /// Human-readable descriptions of broken invariants.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for e in self.entities() {
            if e.start() < 0.0 {
                problems.push(format!("{} starts before zero ({})", e.id(), e.start()));
            }
            if e.start() >= e.end() {
                problems.push(format!(
                    "{} has empty span [{}, {})",
                    e.id(),
                    e.start(),
                    e.end()
                ));
            }
        }
        for c in &self.clips {
            if c.trim_start >= c.trim_end {
                problems.push(format!("{} has empty trim window", c.id));
            }
            if let Some(limit) = c.source_limit() {
                if c.trim_end > limit + 1e-6 {
                    problems.push(format!(
                        "{} trims past end of source ({} > {})",
                        c.id, c.trim_end, limit
                    ));
                }
            }
        }
        let mut ids: Vec<_> = self.entities().map(|e| e.id()).collect();
        ids.sort();
        ids.dedup();
        if ids.len() != self.entity_count() {
            problems.push("duplicate entity ids".to_string());
        }
        for t in &self.transitions {
            if !self.contains(t.from) || !self.contains(t.to) {
                problems.push(format!("transition {} references a missing entity", t.id));
            }
        }
        problems
    }
}
