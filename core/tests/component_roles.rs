//! Component framework invariants: role round-trips, uniqueness, and
//! initialization-order fan-out.

use std::sync::{Arc, Mutex};
use tacsim_core::{
    role::{ROLE_EXTENSION_BASE, INIT_ORDER_EARLY, INIT_ORDER_LATE},
    Component, ComponentList, ComponentRole, InitContext, ParentLink, PartState, PlatformPart,
    Role, SimError, SimTime, ROLE_PLATFORM_PART,
};

const ROLE_EMITTER: Role = Role(ROLE_EXTENSION_BASE.0);
const ROLE_LABEL: Role = Role(ROLE_EXTENSION_BASE.0 + 1);
const ROLE_ABSENT: Role = Role(ROLE_EXTENSION_BASE.0 + 99);

fn host() -> ParentLink {
    ParentLink { platform_index: 0, platform_name: "test-host".to_string() }
}

fn test_rng() -> tacsim_core::rng::SimRng {
    tacsim_core::rng::SimRng::new(0, 0)
}

/// A part-like component satisfying two roles.
struct Emitter {
    name: String,
    part: PartState,
}

impl Emitter {
    fn new(name: &str) -> Box<Self> {
        Box::new(Self { name: name.to_string(), part: PartState::new() })
    }
}

impl ComponentRole for Emitter {
    const ROLE: Role = ROLE_EMITTER;
}

impl Component for Emitter {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[ROLE_EMITTER, ROLE_PLATFORM_PART];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(Self { name: self.name.clone(), part: self.part.clone() })
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
}

impl PlatformPart for Emitter {
    fn part(&self) -> &PartState {
        &self.part
    }

    fn part_mut(&mut self) -> &mut PartState {
        &mut self.part
    }
}

/// A duplicate-permitting component keyed by name.
struct Label {
    name: String,
}

impl Label {
    fn new(name: &str) -> Box<Self> {
        Box::new(Self { name: name.to_string() })
    }
}

impl ComponentRole for Label {
    const ROLE: Role = ROLE_LABEL;
}

impl Component for Label {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[ROLE_LABEL];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(Self { name: self.name.clone() })
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

#[test]
fn role_query_round_trip() {
    let emitter: Box<dyn Component> = Emitter::new("radar");

    assert!(emitter.query_role(ROLE_EMITTER).is_some());
    assert!(emitter.query_role(ROLE_PLATFORM_PART).is_some());
    assert!(emitter.query_role(ROLE_ABSENT).is_none());
    assert_eq!(emitter.primary_role(), ROLE_EMITTER);
}

#[test]
fn one_component_found_under_several_roles() {
    let mut list = ComponentList::new();
    list.add(&host(), Emitter::new("radar")).unwrap();

    // Typed lookup under the primary role.
    assert!(list.find_by_role::<Emitter>().is_some());
    // Untyped lookup under the part role finds the same instance.
    let as_part = list.find_first(ROLE_PLATFORM_PART).expect("part view");
    assert_eq!(as_part.component_name(), "radar");
    assert_eq!(list.parts().count(), 1);
}

#[test]
fn duplicate_unique_role_is_rejected_and_list_unchanged() {
    let mut list = ComponentList::new();
    list.add(&host(), Emitter::new("radar")).unwrap();

    let err = list.add(&host(), Emitter::new("backup-radar")).unwrap_err();
    match err {
        SimError::DuplicateRole { host, role, component } => {
            assert_eq!(host, "test-host");
            assert_eq!(role, ROLE_EMITTER.0);
            assert_eq!(component, "backup-radar");
        }
        other => panic!("expected DuplicateRole, got {other}"),
    }
    assert_eq!(list.len(), 1);

    // Rejection is idempotent.
    assert!(list.add(&host(), Emitter::new("backup-radar")).is_err());
    assert_eq!(list.len(), 1);
}

#[test]
fn duplicate_permitting_components_are_keyed_by_name() {
    let mut list = ComponentList::new();
    list.add(&host(), Label::new("marking")).unwrap();
    list.add(&host(), Label::new("callsign")).unwrap();
    assert_eq!(list.len(), 2);

    let err = list.add(&host(), Label::new("marking")).unwrap_err();
    match err {
        SimError::DuplicateName { name, .. } => assert_eq!(name, "marking"),
        other => panic!("expected DuplicateName, got {other}"),
    }
    assert_eq!(list.len(), 2);
}

/// Records the order in which its initialize phase ran.
struct OrderProbe {
    name: String,
    order: i64,
    fail: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl Component for OrderProbe {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn roles(&self) -> &'static [Role] {
        const ROLES: &[Role] = &[Role(ROLE_EXTENSION_BASE.0 + 50)];
        ROLES
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(Self {
            name: self.name.clone(),
            order: self.order,
            fail: self.fail,
            log: Arc::clone(&self.log),
        })
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

    fn initialization_order(&self) -> i64 {
        self.order
    }

    fn initialize(&mut self, _sim_time: SimTime, _ctx: &mut InitContext) -> bool {
        self.log.lock().unwrap().push(self.name.clone());
        !self.fail
    }
}

fn probe(name: &str, order: i64, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Box<OrderProbe> {
    Box::new(OrderProbe { name: name.to_string(), order, fail, log: Arc::clone(log) })
}

#[test]
fn initialization_runs_in_order_then_insertion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = ComponentList::new();
    list.add(&host(), probe("zones", INIT_ORDER_LATE, false, &log)).unwrap();
    list.add(&host(), probe("first-default", 0, false, &log)).unwrap();
    list.add(&host(), probe("track-manager", INIT_ORDER_EARLY, false, &log)).unwrap();
    list.add(&host(), probe("second-default", 0, false, &log)).unwrap();

    let mut rng = test_rng();
    let mut ctx = InitContext { run_number: 1, rng: &mut rng };
    list.initialize_all(0.0, &mut ctx).expect("initialize");

    assert_eq!(
        *log.lock().unwrap(),
        vec!["track-manager", "first-default", "second-default", "zones"]
    );
}

#[test]
fn phase_fan_out_fails_fast_on_first_refusal() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = ComponentList::new();
    list.add(&host(), probe("early", INIT_ORDER_EARLY, false, &log)).unwrap();
    list.add(&host(), probe("refuses", 0, true, &log)).unwrap();
    list.add(&host(), probe("never-reached", INIT_ORDER_LATE, false, &log)).unwrap();

    let mut rng = test_rng();
    let mut ctx = InitContext { run_number: 1, rng: &mut rng };
    let failed = list.initialize_all(0.0, &mut ctx).unwrap_err();

    assert_eq!(failed, "refuses");
    assert_eq!(*log.lock().unwrap(), vec!["early", "refuses"]);
}
