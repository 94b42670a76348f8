//! Clock and timing utilities for playback synchronization.
//!
//! The master clock never reads wall time itself; callers sample a [`Clock`]
//! once per tick and pass the value down. This module provides:
//! - The [`Clock`] abstraction and a monotonic implementation
//! - Drift measurement between the virtual playhead and a decode handle
//! - A rate controller used to throttle outward notifications

use std::time::Instant;

/// Source of wall-clock seconds for the render loop.
pub trait Clock {
    /// Seconds elapsed since an arbitrary, fixed origin. Must be monotonic.
    fn now_secs(&self) -> f64;
}

/// A monotonic clock anchored at construction time.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    /// The instant the clock started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl MonotonicClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Wall-clock time at clock start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Drift between the authoritative playhead and a stream's reported position.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Where the stream should be (seconds).
    pub reference_secs: f64,
    /// Where the stream reports it is (seconds).
    pub measured_secs: f64,
}

impl DriftMeasurement {
    pub fn new(reference_secs: f64, measured_secs: f64) -> Self {
        Self {
            reference_secs,
            measured_secs,
        }
    }

    /// Drift in seconds (positive = measured is ahead).
    pub fn drift_secs(&self) -> f64 {
        self.measured_secs - self.reference_secs
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_secs() * 1000.0
    }

    /// Whether drift strictly exceeds an acceptable threshold.
    pub fn exceeds_threshold_secs(&self, threshold_secs: f64) -> bool {
        self.drift_secs().abs() > threshold_secs
    }
}

/// Fixed-rate gate used to decouple notification cost from render cost.
#[derive(Debug, Clone)]
pub struct RateController {
    target_interval_secs: f64,
    last_tick_secs: Option<f64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_secs: 1.0 / target_hz.max(1) as f64,
            last_tick_secs: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, now_secs: f64) -> bool {
        match self.last_tick_secs {
            None => {
                self.last_tick_secs = Some(now_secs);
                true
            }
            Some(last) if now_secs >= last + self.target_interval_secs => {
                self.last_tick_secs = Some(now_secs);
                true
            }
            Some(last) if now_secs < last => {
                // Clock origin moved (re-anchored source); restart the gate.
                self.last_tick_secs = Some(now_secs);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_secs = None;
    }

    /// Target interval in seconds.
    pub fn interval_secs(&self) -> f64 {
        self.target_interval_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = MonotonicClock::start();
        let a = clock.now_secs();
        let b = clock.now_secs();
        assert!(b >= a);
        assert!(a < 1.0);
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement::new(1.0, 1.25);
        assert!((drift.drift_secs() - 0.25).abs() < 1e-9);
        assert!((drift.drift_ms() - 250.0).abs() < 1e-6);
        assert!(drift.exceeds_threshold_secs(0.2));
        assert!(!drift.exceeds_threshold_secs(0.3));
    }

    #[test]
    fn test_drift_at_threshold_is_tolerated() {
        let drift = DriftMeasurement::new(2.0, 1.75);
        assert!(!drift.exceeds_threshold_secs(0.25));
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(15);
        assert!(ctrl.should_tick(0.0)); // first tick always fires
        assert!(!ctrl.should_tick(0.016)); // one 60 Hz frame later, too soon
        assert!(ctrl.should_tick(0.07)); // past 1/15 s
    }

    #[test]
    fn test_rate_controller_reset_fires_immediately() {
        let mut ctrl = RateController::new(15);
        assert!(ctrl.should_tick(1.0));
        assert!(!ctrl.should_tick(1.01));
        ctrl.reset();
        assert!(ctrl.should_tick(1.02));
    }
}
