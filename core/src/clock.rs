//! Simulation clock sources.
//!
//! A clock source answers one question: given that the next work item
//! wants to run at time `cap`, what time is it allowed to be? For the
//! event-stepped source time flows from the events themselves; for the
//! real-time source it flows from the wall clock scaled by the clock
//! rate. Stopping a source freezes its answer, which is how pause works.

use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Which executive paces the simulation. Selected at construction and
/// immutable for the life of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Run as fast as events allow.
    EventStepped,
    /// Advance in fixed frames of simulated time.
    FrameStepped { frame_time: SimTime },
    /// Hold simulation time to the wall clock.
    RealTime,
}

impl SimulationMode {
    pub fn is_real_time(&self) -> bool {
        matches!(self, SimulationMode::RealTime)
    }
}

pub trait ClockSource: Send {
    /// Current clock value, never beyond `cap`.
    fn clock(&mut self, cap: SimTime) -> SimTime;

    /// Force the clock to a specific simulation time.
    fn set_clock(&mut self, time: SimTime);

    /// Ratio of simulation time to wall time.
    fn set_rate(&mut self, rate: f64);

    fn rate(&self) -> f64;

    fn start(&mut self);

    fn stop(&mut self);

    fn is_stopped(&self) -> bool;

    /// Return the clock to time zero, stopped.
    fn reset(&mut self);
}

/// Clock for event- and frame-stepped simulations: time flows from the
/// requested cap while running and freezes while stopped.
pub struct EventClockSource {
    current: SimTime,
    rate: f64,
    stopped: bool,
}

impl EventClockSource {
    pub fn new() -> Self {
        Self { current: 0.0, rate: 1.0, stopped: true }
    }
}

impl Default for EventClockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for EventClockSource {
    fn clock(&mut self, cap: SimTime) -> SimTime {
        if !self.stopped {
            self.current = self.current.max(cap);
        }
        self.current.min(cap)
    }

    fn set_clock(&mut self, time: SimTime) {
        self.current = time;
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn start(&mut self) {
        self.stopped = false;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn reset(&mut self) {
        self.current = 0.0;
        self.stopped = true;
    }
}

/// Wall-clock source: simulation time = accumulated scaled wall time.
/// Pausing accumulates elapsed time into the base; rate changes rebase
/// so the clock stays continuous.
pub struct RealTimeClockSource {
    base: SimTime,
    rate: f64,
    started_at: Option<Instant>,
}

impl RealTimeClockSource {
    pub fn new() -> Self {
        Self { base: 0.0, rate: 1.0, started_at: None }
    }

    fn now(&self) -> SimTime {
        match self.started_at {
            Some(start) => self.base + start.elapsed().as_secs_f64() * self.rate,
            None => self.base,
        }
    }

    fn rebase(&mut self) {
        self.base = self.now();
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}

impl Default for RealTimeClockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for RealTimeClockSource {
    fn clock(&mut self, cap: SimTime) -> SimTime {
        self.now().min(cap)
    }

    fn set_clock(&mut self, time: SimTime) {
        self.base = time;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn set_rate(&mut self, rate: f64) {
        self.rebase();
        self.rate = rate;
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.base = self.now();
        self.started_at = None;
    }

    fn is_stopped(&self) -> bool {
        self.started_at.is_none()
    }

    fn reset(&mut self) {
        self.base = 0.0;
        self.started_at = None;
    }
}

/// Build the clock source matching a simulation mode.
pub fn create_clock(mode: SimulationMode) -> Box<dyn ClockSource> {
    match mode {
        SimulationMode::RealTime => Box::new(RealTimeClockSource::new()),
        _ => Box::new(EventClockSource::new()),
    }
}
