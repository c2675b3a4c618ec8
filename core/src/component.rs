//! The component contract.
//!
//! RULE: A component is discovered by role, never by concrete type alone.
//! RULE: Once attached to a ComponentList the list owns the component;
//! clones never share state with the original.
//!
//! A single component may satisfy several roles (a sensor is also a
//! platform part); `roles()` lists every role the instance answers to,
//! primary role first. Role queries return a safe view of the component
//! itself — there is no raw-pointer interface to get wrong.

use crate::{
    error::SimResult,
    platform_part::PlatformPart,
    rng::SimRng,
    role::Role,
    types::{PlatformIndex, SimTime},
};
use serde_json::Value;
use std::any::Any;

/// Non-owning back-reference from a component to its host.
///
/// Established and cleared through `component_parent_changed`. The index
/// is 0 until the host platform has been added to a simulation; the
/// notification fires again once the real index is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub platform_index: PlatformIndex,
    pub platform_name: String,
}

/// Context handed to component initialization phases.
pub struct InitContext<'a> {
    /// The Monte-Carlo run number of the owning simulation.
    pub run_number: u32,
    /// The simulation's auxiliary deterministic RNG stream.
    pub rng: &'a mut SimRng,
}

/// The contract every attachable component must fulfill.
///
/// Phase methods come in two failure tiers: `process_input` reports hard
/// configuration errors, while the initialize phases return `false` for
/// expected model-level refusals (the host decides how to proceed).
pub trait Component: Any + Send + Sync {
    /// Identifier used in diagnostics and name-keyed lookup.
    fn component_name(&self) -> &str;

    /// Every role this component satisfies, primary role first.
    fn roles(&self) -> &'static [Role];

    /// Deep value copy with an independent lifetime.
    fn clone_component(&self) -> Box<dyn Component>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// View of this component as a platform part, if it is one.
    fn as_part(&self) -> Option<&dyn PlatformPart> {
        None
    }

    fn as_part_mut(&mut self) -> Option<&mut dyn PlatformPart> {
        None
    }

    /// Whether more than one component with this primary role may live on
    /// the same host. Duplicate-permitting components are keyed by name.
    fn allows_duplicates(&self) -> bool {
        false
    }

    /// Initialization sequencing. Components with equal order initialize
    /// in insertion order. See the bands in `role.rs`.
    fn initialization_order(&self) -> i64 {
        crate::role::INIT_ORDER_DEFAULT
    }

    /// Consume this component's scenario configuration stanza.
    fn process_input(&mut self, _input: &Value) -> SimResult<()> {
        Ok(())
    }

    /// Pre-initialization pass. Runs before any component's phase one.
    fn pre_initialize(&mut self, _sim_time: SimTime, _ctx: &mut InitContext) -> bool {
        true
    }

    /// Phase one initialization. The component must not assume any state
    /// owned by another component is valid yet.
    fn initialize(&mut self, _sim_time: SimTime, _ctx: &mut InitContext) -> bool {
        true
    }

    /// Phase two initialization. All components have completed phase one.
    fn initialize2(&mut self, _sim_time: SimTime, _ctx: &mut InitContext) -> bool {
        true
    }

    /// Host attach/detach notification. `Some` on attach (and again when
    /// the host's platform index is assigned), `None` on removal.
    fn component_parent_changed(&mut self, _parent: Option<&ParentLink>) {}
}

impl dyn Component {
    /// The role this component is uniquely held under.
    pub fn primary_role(&self) -> Role {
        self.roles()[0]
    }

    /// Returns a view of `self` iff `role` is one of `roles()`.
    pub fn query_role(&self, role: Role) -> Option<&dyn Component> {
        if self.roles().contains(&role) {
            Some(self)
        } else {
            None
        }
    }

    pub fn query_role_mut(&mut self, role: Role) -> Option<&mut dyn Component> {
        if self.roles().contains(&role) {
            Some(self)
        } else {
            None
        }
    }

    /// Typed downcast to a concrete component type.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
