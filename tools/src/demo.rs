//! Demonstration components for the headless runner.
//!
//! These stand in for the real sensor/mover/weapon models: enough to
//! exercise the component framework, part updates, and the event log
//! from a scenario file.

use serde::Deserialize;
use serde_json::Value;
use tacsim_core::{
    role::ROLE_EXTENSION_BASE,
    Component, ComponentRole, InitContext, PartState, PlatformPart, Role, Scenario, SimResult,
    SimTime, ROLE_PLATFORM_PART,
};

pub const ROLE_SCAN_SENSOR: Role = Role(ROLE_EXTENSION_BASE.0);
pub const ROLE_IDENTITY_TAG: Role = Role(ROLE_EXTENSION_BASE.0 + 1);

/// A periodic scanner: counts its own update cadence.
pub struct ScanSensor {
    name: String,
    part: PartState,
    pub scans: u64,
}

#[derive(Debug, Deserialize)]
struct ScanSensorConfig {
    #[serde(default = "default_sensor_name")]
    name: String,
}

fn default_sensor_name() -> String {
    "scanner".to_string()
}

impl ScanSensor {
    pub fn from_config(config: &Value) -> SimResult<Self> {
        let parsed: ScanSensorConfig = if config.is_null() {
            ScanSensorConfig { name: default_sensor_name() }
        } else {
            serde_json::from_value(config.clone())?
        };
        let mut part = PartState::new();
        part.set_update_interval(5.0);
        Ok(Self { name: parsed.name, part, scans: 0 })
    }
}

impl ComponentRole for ScanSensor {
    const ROLE: Role = ROLE_SCAN_SENSOR;
}

impl Component for ScanSensor {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[ROLE_SCAN_SENSOR, ROLE_PLATFORM_PART];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(Self {
            name: self.name.clone(),
            part: self.part.clone(),
            scans: 0,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn as_part(&self) -> Option<&dyn PlatformPart> {
        Some(self)
    }

    fn as_part_mut(&mut self) -> Option<&mut dyn PlatformPart> {
        Some(self)
    }

    fn process_input(&mut self, input: &Value) -> SimResult<()> {
        self.part.process_input(input)
    }

    fn initialize(&mut self, _sim_time: SimTime, ctx: &mut InitContext) -> bool {
        // Desynchronize co-hosted scanners so they do not beat in
        // lockstep. The aux stream keeps core model draws untouched.
        let interval = self.part.update_interval();
        if interval > 0.0 {
            self.part.set_update_interval(interval * ctx.rng.uniform(0.95, 1.05));
        }
        true
    }
}

impl PlatformPart for ScanSensor {
    fn part(&self) -> &PartState {
        &self.part
    }

    fn part_mut(&mut self) -> &mut PartState {
        &mut self.part
    }

    fn update(&mut self, sim_time: SimTime) {
        self.scans += 1;
        log::debug!("T = {sim_time:.3} {}: scan {}", self.name, self.scans);
    }
}

/// A freeform label. Several may live on one platform; they are keyed
/// by name rather than by role.
pub struct IdentityTag {
    name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct IdentityTagConfig {
    name: String,
    #[serde(default)]
    value: String,
}

impl IdentityTag {
    pub fn from_config(config: &Value) -> SimResult<Self> {
        let parsed: IdentityTagConfig = serde_json::from_value(config.clone())?;
        Ok(Self { name: parsed.name, value: parsed.value })
    }
}

impl ComponentRole for IdentityTag {
    const ROLE: Role = ROLE_IDENTITY_TAG;
}

impl Component for IdentityTag {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[ROLE_IDENTITY_TAG];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(Self { name: self.name.clone(), value: self.value.clone() })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn allows_duplicates(&self) -> bool {
        true
    }
}

/// Register factories for every demo component kind.
pub fn register_demo_components(scenario: &mut Scenario) {
    scenario.register_component_factory("scan_sensor", |config| {
        Ok(Box::new(ScanSensor::from_config(config)?))
    });
    scenario.register_component_factory("identity_tag", |config| {
        Ok(Box::new(IdentityTag::from_config(config)?))
    });
}
