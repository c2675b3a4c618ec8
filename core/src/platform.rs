//! Platforms — the simulated entities that host components.
//!
//! A platform is mostly a container for the parts that define how it
//! behaves. Persistent references to a platform must be held as its
//! index, never as a borrow: the platform may be deleted at any time,
//! and `Simulation::platform_by_index` answers whether it still exists.

use crate::{
    component::{Component, InitContext, ParentLink},
    component_list::ComponentList,
    error::SimResult,
    role::{Role, ROLE_PLATFORM},
    types::{PlatformIndex, SimTime},
};
use serde::Deserialize;
use serde_json::Value;

/// What happens to a platform when it is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnBrokenAction {
    /// Remove the platform from the simulation.
    #[default]
    Remove,
    /// Keep the platform but force every part non-operational.
    Disable,
}

/// Platform-level scenario settings.
#[derive(Debug, Default, Deserialize)]
struct PlatformSettings {
    side: Option<String>,
    sign: Option<String>,
    icon: Option<String>,
    creation_time: Option<f64>,
}

pub struct Platform {
    name: String,
    type_name: String,
    side: String,
    sign: String,
    icon: String,
    index: PlatformIndex,
    creation_time: SimTime,
    on_broken_action: OnBrokenAction,
    components: ComponentList,
    is_initialized: bool,
    init_pass: bool,
    is_deleted: bool,
    is_broken: bool,
}

impl Platform {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            type_name: type_name.into(),
            side: String::new(),
            sign: String::new(),
            icon: String::new(),
            index: 0,
            creation_time: 0.0,
            on_broken_action: OnBrokenAction::default(),
            components: ComponentList::new(),
            is_initialized: false,
            init_pass: false,
            is_deleted: false,
            is_broken: false,
        }
    }

    // ── Identity ───────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.refresh_parent_links();
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn side(&self) -> &str {
        &self.side
    }

    pub fn set_side(&mut self, side: impl Into<String>) {
        self.side = side.into();
    }

    /// External callsign, distinct from the unique name.
    pub fn sign(&self) -> &str {
        &self.sign
    }

    pub fn set_sign(&mut self, sign: impl Into<String>) {
        self.sign = sign.into();
    }

    pub fn icon(&self) -> &str {
        if self.icon.is_empty() {
            &self.type_name
        } else {
            &self.icon
        }
    }

    pub fn set_icon(&mut self, icon: impl Into<String>) {
        self.icon = icon.into();
    }

    /// Unique index within the simulation; 0 until added. The index is
    /// part of the platform's identity and is never reassigned, even
    /// after deletion.
    pub fn index(&self) -> PlatformIndex {
        self.index
    }

    pub(crate) fn assign_index(&mut self, index: PlatformIndex) {
        self.index = index;
        self.refresh_parent_links();
    }

    pub fn creation_time(&self) -> SimTime {
        self.creation_time
    }

    pub fn set_creation_time(&mut self, time: SimTime) {
        self.creation_time = time;
    }

    pub fn on_broken_action(&self) -> OnBrokenAction {
        self.on_broken_action
    }

    pub fn set_on_broken_action(&mut self, action: OnBrokenAction) {
        self.on_broken_action = action;
    }

    // ── Status flags ───────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// True once deletion has been scheduled, before the removal event
    /// actually runs.
    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub(crate) fn set_deleted(&mut self) {
        self.is_deleted = true;
    }

    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    pub(crate) fn set_broken(&mut self) {
        self.is_broken = true;
    }

    // ── Components ─────────────────────────────────────────────

    fn parent_link(&self) -> ParentLink {
        ParentLink {
            platform_index: self.index,
            platform_name: self.name.clone(),
        }
    }

    pub fn add_component(&mut self, component: Box<dyn Component>) -> SimResult<()> {
        let link = self.parent_link();
        self.components.add(&link, component)
    }

    pub fn remove_component(&mut self, name: &str) -> Option<Box<dyn Component>> {
        self.components.remove(name)
    }

    pub fn components(&self) -> &ComponentList {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentList {
        &mut self.components
    }

    /// Re-announce the host to every component after the identity
    /// (name or index) changes.
    fn refresh_parent_links(&mut self) {
        let link = self.parent_link();
        self.components.notify_parent_changed(Some(&link));
    }

    // ── Input & initialization ─────────────────────────────────

    /// Consume a platform-instance scenario stanza, then fan the stanza
    /// out to the components.
    pub fn process_input(&mut self, input: &Value) -> SimResult<()> {
        if !input.is_null() {
            let settings = PlatformSettings::deserialize(input)?;
            if let Some(side) = settings.side {
                self.side = side;
            }
            if let Some(sign) = settings.sign {
                self.sign = sign;
            }
            if let Some(icon) = settings.icon {
                self.icon = icon;
            }
            if let Some(t) = settings.creation_time {
                self.creation_time = t;
            }
            self.components.process_input_all(input)?;
        }
        Ok(())
    }

    /// Phase one initialization: pre-initialize then initialize every
    /// component, in initialization order. Returns the name of the first
    /// component that declined.
    ///
    /// May legally be called a second time when a platform initialized
    /// ahead of time is finally added to the simulation.
    pub fn initialize(&mut self, sim_time: SimTime, ctx: &mut InitContext) -> Result<(), String> {
        if self.is_initialized {
            return Ok(());
        }
        self.components.pre_initialize_all(sim_time, ctx)?;
        self.components.initialize_all(sim_time, ctx)?;
        self.init_pass = true;
        Ok(())
    }

    /// Phase two initialization. All components have completed phase
    /// one; cross-component state may now be assumed valid.
    pub fn initialize2(&mut self, sim_time: SimTime, ctx: &mut InitContext) -> Result<(), String> {
        if self.is_initialized {
            return Ok(());
        }
        if !self.init_pass {
            return Err("<phase one incomplete>".to_string());
        }
        self.components.initialize2_all(sim_time, ctx)?;
        self.is_initialized = true;
        Ok(())
    }

    // ── Peer notifications ─────────────────────────────────────

    /// Another platform has been added to the simulation.
    pub fn platform_added(&mut self, sim_time: SimTime, other: PlatformIndex) {
        for part in self.components.parts_mut() {
            part.platform_added(sim_time, other);
        }
    }

    /// Another platform has been deleted from the simulation.
    pub fn platform_deleted(&mut self, other: PlatformIndex) {
        for part in self.components.parts_mut() {
            part.platform_deleted(other);
        }
    }
}

/// A platform is itself a component, so one can act as the host object
/// of another list (towed decoys, boarding parties).
impl Component for Platform {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[ROLE_PLATFORM];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn process_input(&mut self, input: &Value) -> SimResult<()> {
        Platform::process_input(self, input)
    }

    fn initialize(&mut self, sim_time: SimTime, ctx: &mut InitContext) -> bool {
        Platform::initialize(self, sim_time, ctx).is_ok()
    }

    fn initialize2(&mut self, sim_time: SimTime, ctx: &mut InitContext) -> bool {
        Platform::initialize2(self, sim_time, ctx).is_ok()
    }
}

impl crate::role::ComponentRole for Platform {
    const ROLE: Role = ROLE_PLATFORM;
}

impl Clone for Platform {
    /// Deep copy used when instantiating a type template. The clone is
    /// not part of any simulation: its index is cleared.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            side: self.side.clone(),
            sign: self.sign.clone(),
            icon: self.icon.clone(),
            index: 0,
            creation_time: self.creation_time,
            on_broken_action: self.on_broken_action,
            components: self.components.clone(),
            is_initialized: false,
            init_pass: false,
            is_deleted: false,
            is_broken: false,
        }
    }
}
