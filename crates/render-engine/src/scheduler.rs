//! Frame scheduler.
//!
//! Owns the "tick in flight" flag so a tick can never be scheduled while
//! another is still running. [`FrameScheduler::run`] drives ticks from a
//! tokio interval for headless preview; interactive hosts call
//! [`FrameScheduler::begin_tick`]/[`FrameScheduler::end_tick`] from their own
//! frame callback instead.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    running: bool,
    tick_in_flight: bool,
    ticks: u64,
    skipped: u64,
    stop_flag: Arc<AtomicBool>,
}

impl FrameScheduler {
    pub fn new(tick_hz: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / tick_hz.max(1) as f64),
            running: false,
            tick_in_flight: false,
            ticks: 0,
            skipped: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.stop_flag.store(false, Ordering::SeqCst);
            tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Scheduler started");
        }
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            tracing::debug!(ticks = self.ticks, skipped = self.skipped, "Scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Flag another task can set to stop [`FrameScheduler::run`].
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn tick_in_flight(&self) -> bool {
        self.tick_in_flight
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Claim the next tick. False when stopped or a tick is already running.
    pub fn begin_tick(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        if self.tick_in_flight {
            self.skipped += 1;
            return false;
        }
        self.tick_in_flight = true;
        true
    }

    pub fn end_tick(&mut self) {
        if self.tick_in_flight {
            self.tick_in_flight = false;
            self.ticks += 1;
        }
    }

    /// Tick `on_tick` at the configured rate until it breaks or the stop
    /// flag is set. Late ticks are skipped, not bunched. Returns the number
    /// of ticks run.
    pub async fn run<F>(&mut self, mut on_tick: F) -> u64
    where
        F: FnMut(u64) -> ControlFlow<()>,
    {
        let started_at = self.ticks;
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.start();

        while self.is_running() {
            interval.tick().await;
            if !self.begin_tick() {
                continue;
            }
            let flow = on_tick(self.ticks);
            self.end_tick();
            if flow.is_break() {
                self.stop();
            }
        }
        self.stop();
        self.ticks - started_at
    }
}
