//! tacsim-core — an event-stepped simulation engine for military and
//! aerospace constructive simulation.
//!
//! The crate provides the two foundational subsystems every domain
//! model rides on:
//!
//! 1. The event-stepped scheduler: simulation time, a deterministic
//!    time-ordered event queue, the run-state machine, and real-time
//!    pacing against a wall clock.
//! 2. The multi-role component framework: heterogeneous subsystems
//!    attach to platforms, are discovered by capability role rather
//!    than concrete type, and initialize in a well-defined order.
//!
//! Sensors, movers, weapons, and the rest of the model zoo are
//! consumers of these contracts, registered through scenario component
//! factories; none of them live here.

pub mod clock;
pub mod command;
pub mod component;
pub mod component_list;
pub mod error;
pub mod event;
pub mod observer;
pub mod pacing;
pub mod platform;
pub mod platform_part;
pub mod rng;
pub mod role;
pub mod scenario;
pub mod simulation;
pub mod store;
pub mod types;

pub use clock::{ClockSource, SimulationMode};
pub use command::{CommandReply, CommandSender, SimCommand};
pub use component::{Component, InitContext, ParentLink};
pub use component_list::ComponentList;
pub use error::{SimError, SimResult};
pub use event::{Event, EventDisposition, EventId, EventQueue, OneShotEvent};
pub use observer::SimulationObserver;
pub use platform::{OnBrokenAction, Platform};
pub use platform_part::{PartState, PlatformPart};
pub use rng::SimRng;
pub use role::{ComponentRole, Role, ROLE_PLATFORM, ROLE_PLATFORM_PART};
pub use scenario::Scenario;
pub use simulation::{CompletionReason, SimState, Simulation};
pub use store::{EventRecorder, SimStore};
pub use types::{PlatformIndex, RunId, SimTime};
