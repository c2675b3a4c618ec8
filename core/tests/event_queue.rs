//! Scheduler ordering guarantees.
//!
//! These are the properties regression reproducibility rests on: sorted
//! execution, FIFO-stable tie-breaking, and hard rejection of events
//! scheduled into the past.

use std::sync::{Arc, Mutex};
use tacsim_core::{
    Event, EventDisposition, OneShotEvent, Scenario, SimError, SimTime, Simulation,
};

fn started_sim(end_time: f64) -> Simulation {
    let mut scenario = Scenario::new("event-queue-test");
    scenario.set_end_time(end_time);
    scenario.set_initial_seed(7);
    scenario.complete_load();
    let mut sim = Simulation::new(Arc::new(scenario), 1).expect("simulation");
    sim.initialize().expect("initialize");
    sim.start().expect("start");
    sim
}

fn recording_event(time: SimTime, label: &str, log: &Arc<Mutex<Vec<String>>>) -> Box<OneShotEvent> {
    let log = Arc::clone(log);
    let label = label.to_string();
    Box::new(OneShotEvent::new(time, move |_sim| {
        log.lock().unwrap().push(label);
    }))
}

#[test]
fn events_execute_in_sorted_time_order() {
    let mut sim = started_sim(100.0);
    let log = Arc::new(Mutex::new(Vec::new()));

    for &(time, label) in &[(30.0, "c"), (10.0, "a"), (20.0, "b")] {
        sim.add_event(recording_event(time, label, &log)).unwrap();
    }

    let mut advance_times = Vec::new();
    while sim.is_active() {
        advance_times.push(sim.advance_time());
    }

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    for pair in advance_times.windows(2) {
        assert!(pair[0] <= pair[1], "time went backwards: {pair:?}");
    }
}

#[test]
fn equal_times_execute_in_scheduling_order() {
    // Events at t = {5, 5, 3} run as 3 first, then the two t=5 events
    // in their original scheduling order.
    let mut sim = started_sim(100.0);
    let log = Arc::new(Mutex::new(Vec::new()));

    sim.add_event(recording_event(5.0, "first-at-5", &log)).unwrap();
    sim.add_event(recording_event(5.0, "second-at-5", &log)).unwrap();
    sim.add_event(recording_event(3.0, "at-3", &log)).unwrap();

    while sim.is_active() {
        sim.advance_time();
    }

    assert_eq!(
        *log.lock().unwrap(),
        vec!["at-3", "first-at-5", "second-at-5"]
    );
}

#[test]
fn scheduling_into_the_past_is_rejected() {
    let mut sim = started_sim(100.0);
    sim.add_event(Box::new(OneShotEvent::noop(10.0))).unwrap();
    sim.advance_time();
    assert_eq!(sim.sim_time(), 10.0);

    let err = sim.add_event(Box::new(OneShotEvent::noop(5.0))).unwrap_err();
    match err {
        SimError::EventInPast { event_time, sim_time } => {
            assert_eq!(event_time, 5.0);
            assert_eq!(sim_time, 10.0);
        }
        other => panic!("expected EventInPast, got {other}"),
    }
}

#[test]
fn cancelled_event_never_executes() {
    let mut sim = started_sim(100.0);
    let log = Arc::new(Mutex::new(Vec::new()));

    let doomed = sim.add_event(recording_event(5.0, "doomed", &log)).unwrap();
    sim.add_event(recording_event(6.0, "survivor", &log)).unwrap();

    assert!(sim.cancel_event(doomed));
    // Cancelling twice is a no-op.
    assert!(!sim.cancel_event(doomed));

    while sim.is_active() {
        sim.advance_time();
    }

    assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
}

struct RepeatingEvent {
    time: SimTime,
    interval: SimTime,
    remaining: u32,
    fired_at: Arc<Mutex<Vec<SimTime>>>,
}

impl Event for RepeatingEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, _sim: &mut Simulation) -> EventDisposition {
        self.fired_at.lock().unwrap().push(self.time);
        self.remaining -= 1;
        if self.remaining == 0 {
            EventDisposition::Delete
        } else {
            self.time += self.interval;
            EventDisposition::Reschedule(self.time)
        }
    }
}

#[test]
fn reschedule_disposition_requeues_the_event() {
    let mut sim = started_sim(100.0);
    let fired_at = Arc::new(Mutex::new(Vec::new()));

    sim.add_event(Box::new(RepeatingEvent {
        time: 10.0,
        interval: 15.0,
        remaining: 3,
        fired_at: Arc::clone(&fired_at),
    }))
    .unwrap();

    while sim.is_active() {
        sim.advance_time();
    }

    assert_eq!(*fired_at.lock().unwrap(), vec![10.0, 25.0, 40.0]);
}

struct HoldingEvent {
    time: SimTime,
    executions: Arc<Mutex<Vec<SimTime>>>,
}

impl Event for HoldingEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, _sim: &mut Simulation) -> EventDisposition {
        let mut executions = self.executions.lock().unwrap();
        executions.push(self.time);
        if executions.len() == 1 {
            EventDisposition::Hold
        } else {
            EventDisposition::Delete
        }
    }
}

#[test]
fn held_event_waits_for_external_release() {
    let mut sim = started_sim(100.0);
    let executions = Arc::new(Mutex::new(Vec::new()));

    let id = sim
        .add_event(Box::new(HoldingEvent {
            time: 5.0,
            executions: Arc::clone(&executions),
        }))
        .unwrap();
    sim.add_event(Box::new(OneShotEvent::noop(10.0))).unwrap();

    sim.advance_time();
    assert_eq!(executions.lock().unwrap().len(), 1);

    // Parked: advancing further does not re-run it.
    sim.advance_time();
    assert_eq!(sim.sim_time(), 10.0);
    assert_eq!(executions.lock().unwrap().len(), 1);

    sim.release_held_event(id, 20.0).expect("release");
    while sim.is_active() {
        sim.advance_time();
    }
    assert_eq!(executions.lock().unwrap().len(), 2);
}
