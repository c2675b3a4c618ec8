//! Platform parts — the subsystems a platform carries.
//!
//! A part is a component with an on/off switch, an operational state,
//! and an update cadence. Status transitions obey the original ordering
//! rules: a part can only turn on while operational and not fully
//! damaged, and must be turned off before going non-operational.

use crate::{
    component::Component,
    error::{SimError, SimResult},
    types::SimTime,
};
use serde::Deserialize;
use serde_json::Value;

/// Common state embedded in every platform part.
#[derive(Debug, Clone)]
pub struct PartState {
    last_status_change: SimTime,
    update_interval: SimTime,
    update_epoch: u64,
    is_turned_on: bool,
    initially_on: bool,
    is_operational: bool,
    is_restorable: bool,
    is_critical: bool,
    automatic_recovery_time: SimTime,
    damage_factor: f64,
}

impl Default for PartState {
    fn default() -> Self {
        Self {
            last_status_change: 0.0,
            update_interval: 0.0,
            update_epoch: 1,
            is_turned_on: false,
            initially_on: true,
            is_operational: true,
            is_restorable: true,
            is_critical: false,
            automatic_recovery_time: 0.0,
            damage_factor: 0.0,
        }
    }
}

/// Recognized part-level scenario settings. Unknown keys in the stanza
/// belong to the concrete part and are ignored here.
#[derive(Debug, Default, Deserialize)]
struct PartSettings {
    on: Option<bool>,
    operational: Option<bool>,
    restorable: Option<bool>,
    critical: Option<bool>,
    update_interval: Option<f64>,
    automatic_recovery_time: Option<f64>,
    damage_factor: Option<f64>,
}

impl PartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_turned_on(&self) -> bool {
        self.is_turned_on
    }

    pub fn initially_on(&self) -> bool {
        self.initially_on
    }

    pub fn set_initially_on(&mut self, on: bool) {
        self.initially_on = on;
    }

    pub fn is_operational(&self) -> bool {
        self.is_operational
    }

    pub fn is_critical(&self) -> bool {
        self.is_critical
    }

    pub fn set_critical(&mut self, critical: bool) {
        self.is_critical = critical;
    }

    pub fn is_restorable(&self) -> bool {
        self.is_restorable
    }

    pub fn automatic_recovery_time(&self) -> SimTime {
        self.automatic_recovery_time
    }

    pub fn damage_factor(&self) -> f64 {
        self.damage_factor
    }

    /// A part whose damage latched at 1.0 and cannot restore is broken.
    pub fn is_broken(&self) -> bool {
        !self.is_restorable && self.damage_factor >= 1.0
    }

    pub fn update_interval(&self) -> SimTime {
        self.update_interval
    }

    pub fn set_update_interval(&mut self, interval: SimTime) {
        self.update_interval = interval;
    }

    /// Epoch of the currently valid periodic update event. An in-flight
    /// update event carrying a stale epoch deletes itself.
    pub fn update_epoch(&self) -> u64 {
        self.update_epoch
    }

    pub fn bump_update_epoch(&mut self) -> u64 {
        self.update_epoch += 1;
        self.update_epoch
    }

    pub fn last_status_change(&self) -> SimTime {
        self.last_status_change
    }

    pub fn can_be_turned_on(&self) -> bool {
        self.is_operational && !self.is_turned_on && self.damage_factor < 1.0
    }

    /// Consume the part-level keys of a scenario stanza.
    pub fn process_input(&mut self, input: &Value) -> SimResult<()> {
        if input.is_null() {
            return Ok(());
        }
        let settings = PartSettings::deserialize(input)?;
        if let Some(on) = settings.on {
            self.initially_on = on;
        }
        if let Some(operational) = settings.operational {
            self.is_operational = operational;
        }
        if let Some(restorable) = settings.restorable {
            self.is_restorable = restorable;
        }
        if let Some(critical) = settings.critical {
            self.is_critical = critical;
        }
        if let Some(interval) = settings.update_interval {
            self.update_interval = interval;
        }
        if let Some(recovery) = settings.automatic_recovery_time {
            self.automatic_recovery_time = recovery;
        }
        if let Some(damage) = settings.damage_factor {
            if !(0.0..=1.0).contains(&damage) {
                return Err(SimError::Other(anyhow::anyhow!(
                    "damage_factor must be in [0, 1], got {damage}"
                )));
            }
            self.damage_factor = damage;
        }
        Ok(())
    }

    pub(crate) fn record_status_change(&mut self, sim_time: SimTime) {
        self.last_status_change = sim_time;
    }

    pub(crate) fn set_damage_raw(&mut self, damage: f64) {
        self.damage_factor = damage.clamp(0.0, 1.0);
    }
}

/// A component with update cadence and on/off state.
pub trait PlatformPart: Component {
    fn part(&self) -> &PartState;

    fn part_mut(&mut self) -> &mut PartState;

    /// Called by the periodic part-update event while the part is on.
    fn update(&mut self, _sim_time: SimTime) {}

    /// Status-change hooks.
    fn on_turned_on(&mut self, _sim_time: SimTime) {}
    fn on_turned_off(&mut self, _sim_time: SimTime) {}
    fn on_operational_changed(&mut self, _sim_time: SimTime, _operational: bool) {}

    /// Another platform entered or left the simulation.
    fn platform_added(&mut self, _sim_time: SimTime, _other: crate::types::PlatformIndex) {}
    fn platform_deleted(&mut self, _other: crate::types::PlatformIndex) {}
}

impl dyn PlatformPart {
    /// Turn the part on. Legal only while operational and undamaged;
    /// callers check `can_be_turned_on` first.
    pub fn turn_on(&mut self, sim_time: SimTime) {
        debug_assert!(self.part().is_operational);
        debug_assert!(self.part().damage_factor < 1.0);
        self.part_mut().is_turned_on = true;
        self.part_mut().record_status_change(sim_time);
        self.on_turned_on(sim_time);
    }

    pub fn turn_off(&mut self, sim_time: SimTime) {
        self.part_mut().is_turned_on = false;
        self.part_mut().record_status_change(sim_time);
        self.on_turned_off(sim_time);
    }

    /// Change the operational state. Going non-operational forces the
    /// part off first. Returns whether the state actually changed.
    pub fn set_operational(&mut self, sim_time: SimTime, operational: bool) -> bool {
        if self.part().is_operational == operational {
            return false;
        }
        if operational && self.part().damage_factor >= 1.0 {
            return false;
        }
        if !operational && self.part().is_turned_on {
            self.turn_off(sim_time);
        }
        self.part_mut().is_operational = operational;
        self.part_mut().record_status_change(sim_time);
        self.on_operational_changed(sim_time, operational);
        true
    }

    /// Return the part to operational after damage, nudging a fully
    /// damaged (but restorable) part just below total damage so it may
    /// come back to life.
    pub fn restore(&mut self, sim_time: SimTime) {
        if self.part().is_operational || !self.part().is_restorable {
            return;
        }
        if self.part().damage_factor >= 1.0 {
            self.part_mut().set_damage_raw(0.999);
        }
        self.set_operational(sim_time, true);
    }
}
