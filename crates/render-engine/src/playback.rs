//! Master Clock and Render Loop.
//!
//! The master clock owns the virtual playhead. Each tick the render loop
//! advances it from a wall-clock sample, works out which entities are
//! visible, and steers every decode handle towards the local time its clip
//! should be showing.

use montage_common::{DriftMeasurement, EndBehavior, PlaybackDefaults, RateController};
use montage_project_model::{EntityId, MediaCatalog, TimelineState};

use crate::decode::{DecodeCache, DecodeHandle, DecoderFactory, SyncReport};

/// Playback state of the master clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Stopped,
    Playing,
    /// A seek landed; the next tick settles back to `Stopped`.
    Seeking,
}

/// Transient scheduling state. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    pub virtual_time: f64,
    pub is_playing: bool,
    /// Wall-clock seconds at which the playhead was (virtually) at zero.
    pub wall_clock_anchor: f64,
}

/// Result of advancing the clock by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    pub time: f64,
    /// The playhead wrapped from the end back to zero.
    pub wrapped: bool,
    /// The playhead reached the end and playback stopped.
    pub ended: bool,
}

/// The authoritative virtual playhead.
#[derive(Debug, Clone)]
pub struct MasterClock {
    state: ClockState,
    virtual_time: f64,
    anchor: f64,
    end_behavior: EndBehavior,
}

impl MasterClock {
    pub fn new(end_behavior: EndBehavior) -> Self {
        Self {
            state: ClockState::Stopped,
            virtual_time: 0.0,
            anchor: 0.0,
            end_behavior,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == ClockState::Playing
    }

    pub fn time(&self) -> f64 {
        self.virtual_time
    }

    pub fn end_behavior(&self) -> EndBehavior {
        self.end_behavior
    }

    pub fn set_end_behavior(&mut self, behavior: EndBehavior) {
        self.end_behavior = behavior;
    }

    pub fn cursor(&self) -> PlaybackCursor {
        PlaybackCursor {
            virtual_time: self.virtual_time,
            is_playing: self.is_playing(),
            wall_clock_anchor: self.anchor,
        }
    }

    /// Start playing from the current virtual time.
    pub fn play(&mut self, now: f64) {
        if self.is_playing() {
            return;
        }
        self.anchor = now - self.virtual_time;
        self.state = ClockState::Playing;
        tracing::debug!(at = self.virtual_time, "Clock playing");
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            self.state = ClockState::Stopped;
            tracing::debug!(at = self.virtual_time, "Clock paused");
        }
    }

    /// Move the playhead to `t` clamped to `[0, duration]`. Playback stops.
    pub fn seek(&mut self, t: f64, duration: f64) -> f64 {
        let target = if t.is_finite() {
            t.clamp(0.0, duration.max(0.0))
        } else {
            0.0
        };
        self.virtual_time = target;
        self.state = ClockState::Seeking;
        tracing::debug!(to = target, "Clock seek");
        target
    }

    /// Derive the playhead for wall-clock `now`.
    pub fn advance(&mut self, now: f64, duration: f64) -> Advance {
        let mut step = Advance {
            time: self.virtual_time,
            wrapped: false,
            ended: false,
        };
        match self.state {
            ClockState::Stopped => {}
            ClockState::Seeking => self.state = ClockState::Stopped,
            ClockState::Playing => {
                let t = now - self.anchor;
                if duration <= 0.0 {
                    self.virtual_time = 0.0;
                    self.state = ClockState::Stopped;
                    step.ended = true;
                } else if t >= duration {
                    match self.end_behavior {
                        EndBehavior::Loop => {
                            self.virtual_time = 0.0;
                            self.anchor = now;
                            step.wrapped = true;
                            tracing::debug!(duration, "Playhead looped");
                        }
                        EndBehavior::Stop => {
                            self.virtual_time = duration;
                            self.state = ClockState::Stopped;
                            step.ended = true;
                            tracing::debug!(duration, "Playhead reached end");
                        }
                    }
                } else {
                    self.virtual_time = t.max(0.0);
                }
                step.time = self.virtual_time;
            }
        }
        step
    }
}

/// Everything one render-loop tick decided.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    pub time: f64,
    /// Visible entities in paint order.
    pub visible: Vec<EntityId>,
    /// Handles that were force-seeked this tick.
    pub resynced: Vec<EntityId>,
    /// Set when an outward time-change notification is due.
    pub notify: Option<f64>,
    pub wrapped: bool,
    pub ended: bool,
}

/// Drives playback: master clock plus decode handle cache.
#[derive(Debug)]
pub struct RenderLoop {
    clock: MasterClock,
    decoders: DecodeCache,
    notifier: RateController,
    resync_threshold: f64,
    last_notified: Option<f64>,
}

impl RenderLoop {
    pub fn new(defaults: &PlaybackDefaults) -> Self {
        Self {
            clock: MasterClock::new(defaults.end_behavior),
            decoders: DecodeCache::new(),
            notifier: RateController::new(defaults.notify_hz),
            resync_threshold: defaults.resync_threshold_secs.max(0.0),
            last_notified: None,
        }
    }

    pub fn clock(&self) -> &MasterClock {
        &self.clock
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn decoders(&self) -> &DecodeCache {
        &self.decoders
    }

    pub fn decoders_mut(&mut self) -> &mut DecodeCache {
        &mut self.decoders
    }

    /// Reconcile decode handles after the timeline changed.
    pub fn sync(
        &mut self,
        state: &TimelineState,
        catalog: &MediaCatalog,
        factory: &mut dyn DecoderFactory,
    ) -> SyncReport {
        self.decoders.sync(state, catalog, factory)
    }

    /// Start playback and resume only the handles of visible clips.
    pub fn play(&mut self, now: f64, state: &TimelineState) {
        if state.duration > 0.0 && self.clock.time() >= state.duration {
            self.clock.seek(0.0, state.duration);
        }
        self.clock.play(now);
        let t = self.clock.time();
        for (id, handle) in self.decoders.handles_mut() {
            match state.clip(id) {
                Some(clip) if clip.is_visible_at(t) => {
                    handle.seek(clip.local_time(t));
                    handle.play();
                }
                _ => {}
            }
        }
        tracing::info!(at = t, "Playback started");
    }

    /// Pause the clock and every handle.
    pub fn pause(&mut self) {
        self.clock.pause();
        self.decoders.pause_all();
        tracing::info!(at = self.clock.time(), "Playback paused");
    }

    pub fn toggle(&mut self, now: f64, state: &TimelineState) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play(now, state);
        }
    }

    pub fn seek(&mut self, t: f64, state: &TimelineState) -> f64 {
        self.decoders.pause_all();
        self.notifier.reset();
        self.clock.seek(t, state.duration)
    }

    /// Stop and return to zero.
    pub fn rewind(&mut self, state: &TimelineState) {
        self.pause();
        self.seek(0.0, state);
    }

    /// One cooperative tick at wall-clock `now`.
    pub fn tick(&mut self, now: f64, state: &TimelineState) -> TickReport {
        let step = self.clock.advance(now, state.duration);
        let t = step.time;
        let playing = self.clock.is_playing();

        let visible = state.visible_at(t);
        let mut report = TickReport {
            time: t,
            visible: visible.iter().map(|e| e.id()).collect(),
            wrapped: step.wrapped,
            ended: step.ended,
            ..TickReport::default()
        };

        for (id, handle) in self.decoders.handles_mut() {
            let Some(clip) = state.clip(id).filter(|c| c.is_visible_at(t)) else {
                if !handle.is_paused() {
                    handle.pause();
                }
                continue;
            };
            let local = clip.local_time(t);
            if resync(handle.as_mut(), local, playing, step.wrapped, self.resync_threshold) {
                report.resynced.push(id);
            }
        }

        if step.ended {
            self.decoders.pause_all();
            tracing::info!(at = t, "Playback ended");
        }

        if self.notifier.should_tick(now) && self.last_notified != Some(t) {
            self.last_notified = Some(t);
            report.notify = Some(t);
        }

        if !report.resynced.is_empty() {
            tracing::debug!(at = t, handles = ?report.resynced, "Decode handles resynchronized");
        }
        report
    }
}

/// Steer one handle towards `local`. Returns whether it was force-seeked.
fn resync(
    handle: &mut dyn DecodeHandle,
    local: f64,
    playing: bool,
    force: bool,
    threshold: f64,
) -> bool {
    if playing {
        let drift = DriftMeasurement::new(local, handle.current_time());
        let seeked = force || handle.is_paused() || drift.exceeds_threshold_secs(threshold);
        if seeked {
            handle.seek(local);
        }
        if handle.is_paused() {
            handle.play();
        }
        seeked
    } else {
        if !handle.is_paused() {
            handle.pause();
        }
        handle.seek(local);
        true
    }
}
