//! Run-loop progress diagnostics.
//!
//! RULE: This module decides only *when to print*, never whether the
//! simulation blocks. The pacing decision itself lives in
//! `Simulation::wait_for_advance_time`; keeping the two apart means the
//! diagnostic cadence can change without touching time advance.

use crate::types::SimTime;
use serde::{Deserialize, Serialize};

/// Wall-minus-sim slack beyond which a strict real-time run is
/// considered to be falling behind.
pub const FALLING_BEHIND_THRESHOLD: f64 = 0.5;

/// How many healthy real-time progress messages are skipped for each
/// one printed.
const REALTIME_MESSAGE_SKIP: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingOptions {
    /// Progress message interval for non-real-time runs (sim seconds).
    pub message_interval: SimTime,
    /// Progress message interval once a real-time run is connected.
    pub realtime_message_interval: SimTime,
    /// Initial window during which a real-time run still uses the coarse
    /// interval, to avoid log spam before external consumers attach.
    pub deferred_connection_time: SimTime,
}

impl Default for PacingOptions {
    fn default() -> Self {
        Self {
            message_interval: 100.0,
            realtime_message_interval: 10.0,
            deferred_connection_time: 0.0,
        }
    }
}

/// Rolling "T = ..." progress reporter for the run loop.
pub struct PacingMonitor {
    options: PacingOptions,
    interval: SimTime,
    last_message_time: SimTime,
    deferred: bool,
    skip: u32,
}

impl PacingMonitor {
    pub fn new(options: PacingOptions) -> Self {
        let deferred = options.deferred_connection_time > 0.0;
        let interval = options.message_interval;
        Self { options, interval, last_message_time: 0.0, deferred, skip: 0 }
    }

    /// Record one pass of the run loop.
    ///
    /// `time_behind` is `Some(wall - sim)` for real-time runs and `None`
    /// otherwise; `flexible` suppresses the falling-behind report.
    pub fn on_advance(&mut self, sim_time: SimTime, time_behind: Option<f64>, flexible: bool) {
        let previous = self.interval;
        self.interval = if time_behind.is_some() {
            if self.deferred && sim_time < self.options.deferred_connection_time {
                self.options.message_interval
            } else {
                self.deferred = false;
                self.options.realtime_message_interval
            }
        } else {
            self.options.message_interval
        };

        // An interval change re-anchors the cadence; without this a
        // coarse-to-fine switch would replay every missed fine interval.
        if self.interval != previous {
            self.last_message_time = sim_time;
            log::info!("T = {sim_time:.3}");
            return;
        }

        if sim_time - self.last_message_time < self.interval {
            return;
        }
        self.last_message_time += self.interval;

        match time_behind {
            Some(behind) if behind >= FALLING_BEHIND_THRESHOLD && !flexible => {
                log::warn!("T = {sim_time:.3} FALLING BEHIND ({behind:.3} sec)");
            }
            Some(_) => {
                // Healthy real-time passes only print every Nth message.
                if self.skip == 0 {
                    log::info!("T = {sim_time:.3}");
                }
                self.skip = (self.skip + 1) % REALTIME_MESSAGE_SKIP;
            }
            None => {
                log::info!("T = {sim_time:.3}");
            }
        }
    }
}
