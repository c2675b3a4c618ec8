//! Roster semantics: index identity, lookups, deferred creation,
//! deferred removal, and default naming.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tacsim_core::{OneShotEvent, Platform, Scenario, SimError, Simulation};

fn started_sim(end_time: f64) -> Simulation {
    let mut scenario = Scenario::new("platform-test");
    scenario.set_end_time(end_time);
    scenario.set_initial_seed(3);
    scenario.complete_load();
    let mut sim = Simulation::new(Arc::new(scenario), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();
    sim
}

fn named(type_name: &str, name: &str) -> Platform {
    let mut platform = Platform::new(type_name);
    platform.set_name(name);
    platform
}

#[test]
fn add_and_look_up_by_name_sign_and_index() {
    let mut sim = started_sim(100.0);
    let mut platform = named("frigate", "intrepid");
    platform.set_side("blue");
    platform.set_sign("INT-1");

    let index = sim.add_platform(platform).unwrap();
    assert!(index > 0, "index 0 is the no-platform sentinel");
    assert!(sim.platform_exists(index));
    assert_eq!(sim.platform_by_index(index).unwrap().name(), "intrepid");
    assert_eq!(sim.platform_by_name("intrepid").unwrap().index(), index);
    assert_eq!(sim.platform_by_sign("INT-1").unwrap().name(), "intrepid");
    assert_eq!(sim.platform_count(), 1);
}

#[test]
fn deletion_is_deferred_to_an_event_and_indices_are_never_reused() {
    let mut sim = started_sim(100.0);
    let first = sim.add_platform(named("frigate", "alpha")).unwrap();

    sim.delete_platform(sim.sim_time(), first);
    // Marked, but still present until the removal event runs.
    assert!(sim.platform_by_index(first).unwrap().is_deleted());
    assert!(sim.platform_exists(first));

    sim.advance_time();
    assert!(!sim.platform_exists(first));
    assert!(sim.platform_by_name("alpha").is_none());
    // Identity outlives the platform.
    assert_eq!(sim.platform_name_of(first), Some("alpha"));
    assert_eq!(sim.platform_type_of(first), Some("frigate"));

    // A later platform gets a fresh index, never the vacated one.
    let second = sim.add_platform(named("frigate", "bravo")).unwrap();
    assert_ne!(second, first);
    assert!(second > first);
}

#[test]
fn platform_remains_accessible_during_the_deleting_event() {
    let mut sim = started_sim(100.0);
    let index = sim.add_platform(named("frigate", "doomed")).unwrap();
    let observed = Arc::new(AtomicBool::new(false));
    let observed_in_event = Arc::clone(&observed);

    sim.add_event(Box::new(OneShotEvent::new(5.0, move |sim| {
        sim.delete_platform(5.0, index);
        // Deferred removal: the pointer is still valid inside the event
        // that requested the deletion.
        observed_in_event.store(sim.platform_by_index(index).is_some(), Ordering::SeqCst);
    })))
    .unwrap();

    while sim.is_active() {
        sim.advance_time();
    }
    assert!(observed.load(Ordering::SeqCst));
    assert!(!sim.platform_exists(index));
}

#[test]
fn future_platforms_enter_through_a_scheduled_event() {
    let mut sim = started_sim(100.0);
    let late = named("uav", "late-arrival");
    let result = sim.add_platform_at(30.0, late).unwrap();
    assert!(result.is_none(), "a future add is deferred, not immediate");
    assert!(sim.platform_by_name("late-arrival").is_none());

    let seen_at_35 = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&seen_at_35);
    sim.add_event(Box::new(OneShotEvent::new(35.0, move |sim| {
        seen.store(sim.platform_by_name("late-arrival").is_some(), Ordering::SeqCst);
    })))
    .unwrap();

    while sim.is_active() {
        sim.advance_time();
    }
    assert!(seen_at_35.load(Ordering::SeqCst));
}

#[test]
fn unnamed_platforms_get_per_type_default_names() {
    let mut sim = started_sim(100.0);
    let a = sim.add_platform(Platform::new("uav")).unwrap();
    let b = sim.add_platform(Platform::new("uav")).unwrap();
    let c = sim.add_platform(Platform::new("tank")).unwrap();

    assert_eq!(sim.platform_by_index(a).unwrap().name(), "uav:1");
    assert_eq!(sim.platform_by_index(b).unwrap().name(), "uav:2");
    assert_eq!(sim.platform_by_index(c).unwrap().name(), "tank:1");
}

#[test]
fn duplicate_platform_names_are_rejected() {
    let mut sim = started_sim(100.0);
    sim.add_platform(named("uav", "solo")).unwrap();
    let err = sim.add_platform(named("uav", "solo")).unwrap_err();
    assert!(matches!(err, SimError::DuplicatePlatformName { .. }));
    assert_eq!(sim.platform_count(), 1);
}

#[test]
fn platform_entry_iterates_in_addition_order() {
    let mut sim = started_sim(100.0);
    sim.add_platform(named("uav", "one")).unwrap();
    sim.add_platform(named("uav", "two")).unwrap();
    sim.add_platform(named("uav", "three")).unwrap();

    let names: Vec<&str> = (0..sim.platform_count())
        .filter_map(|entry| sim.platform_entry(entry))
        .map(|p| p.name())
        .collect();
    assert_eq!(names, vec!["one", "two", "three"]);
}
