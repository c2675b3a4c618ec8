//! Simulation observers.
//!
//! Observers receive lifecycle notifications on the simulation thread,
//! synchronously, in registration order. They exist so output layers
//! (event logs, network bridges, consoles) can watch a run without the
//! core knowing they exist.

use crate::{
    platform::Platform,
    simulation::{CompletionReason, SimState},
    types::SimTime,
};

pub trait SimulationObserver: Send {
    fn state_changed(&mut self, _state: SimState) {}

    fn advance_time(&mut self, _sim_time: SimTime) {}

    fn platform_added(&mut self, _sim_time: SimTime, _platform: &Platform) {}

    fn platform_initialized(&mut self, _sim_time: SimTime, _platform: &Platform) {}

    fn platform_deleted(&mut self, _sim_time: SimTime, _platform: &Platform) {}

    fn platform_broken(&mut self, _sim_time: SimTime, _platform: &Platform) {}

    fn part_turned_on(&mut self, _sim_time: SimTime, _platform: &Platform, _part_name: &str) {}

    fn part_turned_off(&mut self, _sim_time: SimTime, _platform: &Platform, _part_name: &str) {}

    fn clock_rate_changed(&mut self, _rate: f64) {}

    fn simulation_complete(&mut self, _sim_time: SimTime, _reason: CompletionReason) {}
}
