//! Real-time pacing, run at a very high clock rate so the whole run
//! takes a few milliseconds of wall time.

use std::sync::{Arc, Mutex};
use tacsim_core::{OneShotEvent, Scenario, SimTime, Simulation, SimulationMode};

#[test]
fn real_time_run_executes_events_in_order_and_completes() {
    let mut scenario = Scenario::new("realtime-test");
    scenario.set_mode(SimulationMode::RealTime);
    // 20 simulated seconds in ~2 ms of wall time.
    scenario.set_clock_rate(10_000.0);
    scenario.set_end_time(20.0);
    scenario.set_initial_seed(1);
    scenario.complete_load();

    let mut sim = Simulation::new(Arc::new(scenario), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();

    let fired: Arc<Mutex<Vec<SimTime>>> = Arc::new(Mutex::new(Vec::new()));
    for &t in &[12.0, 4.0, 8.0] {
        let fired = Arc::clone(&fired);
        sim.add_event(Box::new(OneShotEvent::new(t, move |_sim| {
            fired.lock().unwrap().push(t);
        })))
        .unwrap();
    }

    let final_time = sim.run_to_completion();
    assert_eq!(*fired.lock().unwrap(), vec![4.0, 8.0, 12.0]);
    assert_eq!(final_time, 20.0);
    assert!(sim.time_behind() >= 0.0);
}
