//! The scenario — the read-only catalogue a simulation instantiates from.
//!
//! RULE: A simulation never mutates its scenario. The catalogue is built
//! once, sealed with `complete_load()`, and then shared (behind an Arc)
//! by every run cloned from it: Monte-Carlo repetitions, resets, and
//! parallel simulations all see the same type definitions.
//!
//! Component factories are owned by the scenario object, never by
//! process-wide statics, so independent scenarios coexist in one
//! process.

use crate::{
    clock::SimulationMode,
    component::Component,
    error::{SimError, SimResult},
    pacing::PacingOptions,
    platform::Platform,
    types::SimTime,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub type ComponentFactory = Box<dyn Fn(&Value) -> SimResult<Box<dyn Component>> + Send + Sync>;

/// One component stanza inside a platform type definition.
#[derive(Debug, Deserialize)]
pub struct ComponentDef {
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Deserialize)]
pub struct PlatformTypeDef {
    pub name: String,
    #[serde(default)]
    pub components: Vec<ComponentDef>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformDef {
    /// Instance name; platforms without one get a default name when
    /// added to the simulation.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub config: Value,
}

/// The on-disk scenario format consumed by the runner.
#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    pub name: String,
    #[serde(default = "default_end_time")]
    pub end_time: SimTime,
    #[serde(default = "default_mode")]
    pub mode: SimulationMode,
    #[serde(default = "default_clock_rate")]
    pub clock_rate: f64,
    #[serde(default)]
    pub flexible_realtime: bool,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub pacing: Option<PacingOptions>,
    #[serde(default)]
    pub platform_types: Vec<PlatformTypeDef>,
    #[serde(default)]
    pub platforms: Vec<PlatformDef>,
}

fn default_end_time() -> SimTime {
    f64::MAX
}

fn default_mode() -> SimulationMode {
    SimulationMode::EventStepped
}

fn default_clock_rate() -> f64 {
    1.0
}

pub struct Scenario {
    name: String,
    end_time: SimTime,
    mode: SimulationMode,
    clock_rate: f64,
    flexible_realtime: bool,
    initial_seed: u64,
    pacing: PacingOptions,
    factories: HashMap<String, ComponentFactory>,
    platform_types: HashMap<String, Platform>,
    input_platforms: Vec<Platform>,
    load_complete: bool,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            end_time: f64::MAX,
            mode: SimulationMode::EventStepped,
            clock_rate: 1.0,
            flexible_realtime: false,
            initial_seed: 0,
            pacing: PacingOptions::default(),
            factories: HashMap::new(),
            platform_types: HashMap::new(),
            input_platforms: Vec::new(),
            load_complete: false,
        }
    }

    // ── Catalogue accessors ────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn end_time(&self) -> SimTime {
        self.end_time
    }

    pub fn set_end_time(&mut self, end_time: SimTime) {
        self.end_time = end_time;
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SimulationMode) {
        self.mode = mode;
    }

    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    pub fn set_clock_rate(&mut self, rate: f64) {
        self.clock_rate = rate;
    }

    pub fn flexible_realtime(&self) -> bool {
        self.flexible_realtime
    }

    pub fn set_flexible_realtime(&mut self, flexible: bool) {
        self.flexible_realtime = flexible;
    }

    pub fn initial_seed(&self) -> u64 {
        self.initial_seed
    }

    pub fn set_initial_seed(&mut self, seed: u64) {
        self.initial_seed = seed;
    }

    pub fn pacing(&self) -> &PacingOptions {
        &self.pacing
    }

    pub fn set_pacing(&mut self, pacing: PacingOptions) {
        self.pacing = pacing;
    }

    /// Deterministic seed for one Monte-Carlo run.
    pub fn seed_for_run(&self, run_number: u32) -> u64 {
        self.initial_seed ^ (u64::from(run_number)).wrapping_mul(0x9e37_79b9_7f4a_7c15)
    }

    pub fn load_is_complete(&self) -> bool {
        self.load_complete
    }

    /// Seal the catalogue. Must be called before any simulation is
    /// constructed from this scenario.
    pub fn complete_load(&mut self) {
        self.load_complete = true;
    }

    // ── Component factories ────────────────────────────────────

    pub fn register_component_factory<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> SimResult<Box<dyn Component>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Build a component of the named kind from its config stanza.
    pub fn create_component(&self, kind: &str, config: &Value) -> SimResult<Box<dyn Component>> {
        let factory = self.factories.get(kind).ok_or_else(|| SimError::UnknownType {
            kind: "component",
            name: kind.to_string(),
        })?;
        let mut component = factory(config)?;
        component.process_input(config)?;
        Ok(component)
    }

    // ── Platform types and instances ───────────────────────────

    pub fn define_platform_type(&mut self, template: Platform) {
        self.platform_types.insert(template.type_name().to_string(), template);
    }

    pub fn platform_type(&self, name: &str) -> Option<&Platform> {
        self.platform_types.get(name)
    }

    /// Clone a fresh platform from a type template.
    pub fn instantiate_type(&self, type_name: &str) -> SimResult<Platform> {
        self.platform_types
            .get(type_name)
            .cloned()
            .ok_or_else(|| SimError::UnknownType {
                kind: "platform",
                name: type_name.to_string(),
            })
    }

    /// Declare a platform instance to be created at run start.
    pub fn add_input_platform(&mut self, platform: Platform) {
        self.input_platforms.push(platform);
    }

    pub fn input_platform_count(&self) -> usize {
        self.input_platforms.len()
    }

    pub fn input_platforms(&self) -> impl Iterator<Item = &Platform> {
        self.input_platforms.iter()
    }

    // ── File loading ───────────────────────────────────────────

    /// Apply a parsed scenario file to this scenario. Component
    /// factories for every referenced kind must be registered first.
    pub fn apply_file(&mut self, file: &ScenarioFile) -> SimResult<()> {
        self.name = file.name.clone();
        self.end_time = file.end_time;
        self.mode = file.mode;
        self.clock_rate = file.clock_rate;
        self.flexible_realtime = file.flexible_realtime;
        self.initial_seed = file.seed;
        if let Some(pacing) = &file.pacing {
            self.pacing = pacing.clone();
        }

        for type_def in &file.platform_types {
            let mut template = Platform::new(&type_def.name);
            for component_def in &type_def.components {
                // Factories read the component name out of their stanza;
                // a `name` field on the def is folded in for them.
                let mut config = component_def.config.clone();
                if let (Some(name), Some(map)) = (&component_def.name, config.as_object_mut()) {
                    map.entry("name").or_insert(Value::String(name.clone()));
                }
                let config = if config.is_null() {
                    match &component_def.name {
                        Some(name) => serde_json::json!({ "name": name }),
                        None => config,
                    }
                } else {
                    config
                };
                let component = self.create_component(&component_def.kind, &config)?;
                template.add_component(component)?;
            }
            self.define_platform_type(template);
        }

        for platform_def in &file.platforms {
            let mut platform = self.instantiate_type(&platform_def.type_name)?;
            if let Some(name) = &platform_def.name {
                platform.set_name(name.clone());
            }
            platform.process_input(&platform_def.config)?;
            self.add_input_platform(platform);
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> SimResult<ScenarioFile> {
        Ok(serde_json::from_str(json)?)
    }
}
