//! Ordered, uniquely-owning collection of components on one host.
//!
//! RULE: At most one component may hold a given primary role unless that
//! component type explicitly allows duplicates; duplicate-permitting
//! components are disambiguated by name instead.
//!
//! Phase fan-out runs in initialization order, then insertion order, and
//! aborts on the first component that fails (fail-fast, not fail-partial).

use crate::{
    component::{Component, InitContext, ParentLink},
    error::{SimError, SimResult},
    platform_part::PlatformPart,
    role::{ComponentRole, Role},
    types::SimTime,
};
use serde_json::Value;

#[derive(Default)]
pub struct ComponentList {
    components: Vec<Box<dyn Component>>,
}

impl ComponentList {
    pub fn new() -> Self {
        Self { components: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Add a component, enforcing the uniqueness invariants.
    /// A rejected add leaves the list unchanged.
    pub fn add(&mut self, host: &ParentLink, component: Box<dyn Component>) -> SimResult<()> {
        let role = component.primary_role();
        debug_assert!(role.is_valid(), "component registered with invalid role");
        for existing in &self.components {
            if existing.primary_role() != role {
                continue;
            }
            if !component.allows_duplicates() || !existing.allows_duplicates() {
                return Err(SimError::DuplicateRole {
                    host: host.platform_name.clone(),
                    role: role.0,
                    component: component.component_name().to_string(),
                });
            }
            if existing.component_name() == component.component_name() {
                return Err(SimError::DuplicateName {
                    host: host.platform_name.clone(),
                    name: component.component_name().to_string(),
                });
            }
        }
        let mut component = component;
        component.component_parent_changed(Some(host));
        self.components.push(component);
        Ok(())
    }

    /// Remove a component by name. The removed component is notified that
    /// it no longer has a parent and returned to the caller.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Component>> {
        let pos = self.components.iter().position(|c| c.component_name() == name)?;
        let mut component = self.components.remove(pos);
        component.component_parent_changed(None);
        Some(component)
    }

    /// First component satisfying the role registered for `T`, downcast.
    pub fn find_by_role<T: Component + ComponentRole>(&self) -> Option<&T> {
        self.components
            .iter()
            .filter(|c| c.roles().contains(&T::ROLE))
            .find_map(|c| c.downcast_ref::<T>())
    }

    pub fn find_by_role_mut<T: Component + ComponentRole>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .filter(|c| c.roles().contains(&T::ROLE))
            .find_map(|c| c.downcast_mut::<T>())
    }

    /// First component satisfying `role`, as an untyped view.
    pub fn find_first(&self, role: Role) -> Option<&dyn Component> {
        self.components.iter().find_map(|c| c.query_role(role))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.component_name() == name)
            .map(|c| c.as_ref())
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut dyn Component> {
        self.components
            .iter_mut()
            .find(|c| c.component_name() == name)
            .map(|c| c.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(|c| c.as_ref())
    }

    /// All components that expose the platform-part view.
    pub fn parts(&self) -> impl Iterator<Item = &dyn PlatformPart> {
        self.components.iter().filter_map(|c| c.as_part())
    }

    pub fn parts_mut(&mut self) -> impl Iterator<Item = &mut dyn PlatformPart> {
        self.components.iter_mut().filter_map(|c| c.as_part_mut())
    }

    pub fn part_by_name(&self, name: &str) -> Option<&dyn PlatformPart> {
        self.components
            .iter()
            .filter(|c| c.component_name() == name)
            .find_map(|c| c.as_part())
    }

    pub fn part_by_name_mut(&mut self, name: &str) -> Option<&mut dyn PlatformPart> {
        self.components
            .iter_mut()
            .filter(|c| c.component_name() == name)
            .find_map(|c| c.as_part_mut())
    }

    /// Notify every component of a host change.
    pub fn notify_parent_changed(&mut self, parent: Option<&ParentLink>) {
        for component in &mut self.components {
            component.component_parent_changed(parent);
        }
    }

    /// Component indices sorted by (initialization order, insertion order).
    fn by_initialization_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.components.len()).collect();
        order.sort_by_key(|&i| (self.components[i].initialization_order(), i));
        order
    }

    /// Forward a scenario input stanza to every component, in order.
    pub fn process_input_all(&mut self, input: &Value) -> SimResult<()> {
        for component in &mut self.components {
            component.process_input(input)?;
        }
        Ok(())
    }

    /// Run one initialize phase over all components. Returns the name of
    /// the first component that declined, if any.
    pub fn run_phase<F>(&mut self, mut phase: F) -> Result<(), String>
    where
        F: FnMut(&mut dyn Component) -> bool,
    {
        for i in self.by_initialization_order() {
            if !phase(self.components[i].as_mut()) {
                return Err(self.components[i].component_name().to_string());
            }
        }
        Ok(())
    }

    pub fn pre_initialize_all(
        &mut self,
        sim_time: SimTime,
        ctx: &mut InitContext,
    ) -> Result<(), String> {
        self.run_phase(|c| c.pre_initialize(sim_time, ctx))
    }

    pub fn initialize_all(
        &mut self,
        sim_time: SimTime,
        ctx: &mut InitContext,
    ) -> Result<(), String> {
        self.run_phase(|c| c.initialize(sim_time, ctx))
    }

    pub fn initialize2_all(
        &mut self,
        sim_time: SimTime,
        ctx: &mut InitContext,
    ) -> Result<(), String> {
        self.run_phase(|c| c.initialize2(sim_time, ctx))
    }
}

impl Clone for ComponentList {
    fn clone(&self) -> Self {
        Self {
            components: self.components.iter().map(|c| c.clone_component()).collect(),
        }
    }
}
