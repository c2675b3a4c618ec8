//! Simulation state machine: monotonic transitions, identifiable
//! configuration failures, completion reasons, and reset.

use std::sync::Arc;
use tacsim_core::{
    role::ROLE_EXTENSION_BASE,
    CompletionReason, Component, ComponentRole, InitContext, OneShotEvent, Platform, Role,
    Scenario, SimError, SimState, SimTime, Simulation,
};

const ROLE_GATE: Role = Role(ROLE_EXTENSION_BASE.0 + 10);

/// A component that refuses to initialize on demand.
struct InitGate {
    name: String,
    refuse: bool,
}

impl InitGate {
    fn new(name: &str, refuse: bool) -> Box<Self> {
        Box::new(Self { name: name.to_string(), refuse })
    }
}

impl ComponentRole for InitGate {
    const ROLE: Role = ROLE_GATE;
}

impl Component for InitGate {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[ROLE_GATE];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(Self { name: self.name.clone(), refuse: self.refuse })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn initialize(&mut self, _sim_time: SimTime, _ctx: &mut InitContext) -> bool {
        !self.refuse
    }
}

fn scenario_with_statics(count: usize, end_time: f64) -> Arc<Scenario> {
    let mut scenario = Scenario::new("lifecycle-test");
    scenario.set_end_time(end_time);
    scenario.set_initial_seed(11);
    for i in 0..count {
        let mut platform = Platform::new("outpost");
        platform.set_name(format!("outpost-{i}"));
        scenario.add_input_platform(platform);
    }
    scenario.complete_load();
    Arc::new(scenario)
}

#[test]
fn initialize_is_rejected_outside_pending_initialize() {
    let mut sim = Simulation::new(scenario_with_statics(1, 50.0), 1).unwrap();
    assert_eq!(sim.state(), SimState::PendingInitialize);

    sim.initialize().expect("first initialize");
    assert_eq!(sim.state(), SimState::PendingStart);

    // A second initialize without a reset is a state error, not a
    // silent double-construction.
    let err = sim.initialize().unwrap_err();
    assert!(matches!(err, SimError::StateError { operation: "initialize", .. }));
    assert_eq!(sim.state(), SimState::PendingStart);
}

#[test]
fn start_requires_pending_start() {
    let mut sim = Simulation::new(scenario_with_statics(1, 50.0), 1).unwrap();
    let err = sim.start().unwrap_err();
    assert!(matches!(err, SimError::StateError { operation: "start", .. }));
    assert_eq!(sim.state(), SimState::PendingInitialize);
}

#[test]
fn simulation_from_incomplete_scenario_is_rejected() {
    let scenario = Scenario::new("unsealed");
    let err = Simulation::new(Arc::new(scenario), 1).unwrap_err();
    assert!(matches!(err, SimError::ScenarioIncomplete));
}

#[test]
fn failing_component_fails_initialize_with_identity() {
    let mut scenario = Scenario::new("failing-component");
    scenario.set_end_time(50.0);
    let mut platform = Platform::new("relay");
    platform.set_name("relay-1");
    platform.add_component(InitGate::new("good-gate", false)).unwrap();
    scenario.add_input_platform(platform);

    let mut bad = Platform::new("relay");
    bad.set_name("relay-2");
    bad.add_component(InitGate::new("bad-gate", true)).unwrap();
    scenario.add_input_platform(bad);
    scenario.complete_load();

    let mut sim = Simulation::new(Arc::new(scenario), 1).unwrap();
    let err = sim.initialize().unwrap_err();
    match err {
        SimError::PlatformInitialization { platform, component } => {
            assert_eq!(platform, "relay-2");
            assert_eq!(component, "bad-gate");
        }
        other => panic!("expected PlatformInitialization, got {other}"),
    }
    // The simulation stays un-started; the roster was torn down.
    assert_eq!(sim.state(), SimState::PendingInitialize);
    assert_eq!(sim.platform_count(), 0);
}

#[test]
fn duplicate_platform_name_fails_initialize() {
    let mut scenario = Scenario::new("name-collision");
    scenario.set_end_time(50.0);
    for _ in 0..2 {
        let mut platform = Platform::new("outpost");
        platform.set_name("same-name");
        scenario.add_input_platform(platform);
    }
    scenario.complete_load();

    let mut sim = Simulation::new(Arc::new(scenario), 1).unwrap();
    let err = sim.initialize().unwrap_err();
    assert!(matches!(err, SimError::DuplicatePlatformName { .. }));
    assert_eq!(sim.state(), SimState::PendingInitialize);
}

#[test]
fn run_completes_with_end_time_reason() {
    let mut sim = Simulation::new(scenario_with_statics(2, 25.0), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();
    assert_eq!(sim.state(), SimState::Active);

    let final_time = sim.run_to_completion();
    assert_eq!(sim.state(), SimState::Complete);
    assert_eq!(sim.completion_reason(), CompletionReason::EndTimeReached);
    assert_eq!(final_time, 25.0);
    // Teardown deleted the remaining platforms.
    assert_eq!(sim.platform_count(), 0);
    assert_eq!(sim.pending_event_count(), 0);
}

#[test]
fn requested_termination_stops_the_run() {
    let mut sim = Simulation::new(scenario_with_statics(1, 1000.0), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();

    sim.add_event(Box::new(OneShotEvent::new(5.0, |sim| {
        sim.request_termination();
    })))
    .unwrap();

    sim.run_to_completion();
    assert_eq!(sim.state(), SimState::Complete);
    assert_eq!(sim.completion_reason(), CompletionReason::Terminate);
    assert!(sim.sim_time() <= 6.0, "terminated late at {}", sim.sim_time());
}

#[test]
fn reset_rebuilds_to_scenario_statics_only() {
    let mut sim = Simulation::new(scenario_with_statics(2, 1000.0), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();

    // Grow the roster dynamically, then request a reset.
    sim.add_event(Box::new(OneShotEvent::new(1.0, |sim| {
        for _ in 0..8 {
            sim.add_platform(Platform::new("dynamic")).expect("dynamic add");
        }
    })))
    .unwrap();
    sim.add_event(Box::new(OneShotEvent::new(2.0, |sim| {
        sim.request_reset();
    })))
    .unwrap();

    sim.run_to_completion();
    assert_eq!(sim.completion_reason(), CompletionReason::Reset);
    assert!(sim.should_execute(), "reset completion must allow re-execution");
    // Post-completion the queue and roster are empty.
    assert_eq!(sim.pending_event_count(), 0);
    assert_eq!(sim.platform_count(), 0);

    // Re-initialize: only the scenario-declared statics come back.
    sim.initialize().unwrap();
    assert_eq!(sim.platform_count(), 2);
    assert_eq!(sim.state(), SimState::PendingStart);

    // The second pass runs to its end time like any other run.
    sim.start().unwrap();
    sim.add_event(Box::new(OneShotEvent::new(1.0, |sim| {
        sim.request_termination();
    })))
    .unwrap();
    sim.run_to_completion();
    assert_eq!(sim.completion_reason(), CompletionReason::Terminate);
    assert!(!sim.should_execute());
}
