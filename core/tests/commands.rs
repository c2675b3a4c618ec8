//! The external command boundary: each command is an independent action
//! applied between events, with replies for issuers that want them.

use std::sync::{Arc, Mutex};
use tacsim_core::{
    CommandReply, CompletionReason, OneShotEvent, Platform, Scenario, SimCommand, SimState,
    Simulation,
};

fn started_sim(end_time: f64) -> Simulation {
    let mut scenario = Scenario::new("command-test");
    scenario.set_end_time(end_time);
    scenario.set_initial_seed(9);
    scenario.complete_load();
    let mut sim = Simulation::new(Arc::new(scenario), 1).unwrap();
    sim.initialize().unwrap();
    sim.start().unwrap();
    sim
}

#[test]
fn pause_freezes_event_dispatch_and_resume_releases_it() {
    let mut sim = started_sim(100.0);
    let fired = Arc::new(Mutex::new(false));
    let fired_in_event = Arc::clone(&fired);
    sim.add_event(Box::new(OneShotEvent::new(5.0, move |_sim| {
        *fired_in_event.lock().unwrap() = true;
    })))
    .unwrap();

    let sender = sim.command_sender();
    sender.send(SimCommand::Pause);
    sim.advance_time();
    assert!(!*fired.lock().unwrap(), "no events dispatch while paused");
    assert_eq!(sim.sim_time(), 0.0);

    sender.send(SimCommand::Resume);
    sim.advance_time();
    assert!(*fired.lock().unwrap());
    assert_eq!(sim.sim_time(), 5.0);
}

#[test]
fn commands_reply_when_asked() {
    let mut sim = started_sim(100.0);
    let sender = sim.command_sender();

    let reply = sender.send_with_reply(SimCommand::SetClockRate { rate: 4.0 });
    sim.advance_time();
    assert_eq!(reply.try_recv().unwrap(), CommandReply::Ack);
    assert_eq!(sim.clock_rate(), 4.0);

    let reply = sender.send_with_reply(SimCommand::SetClockRate { rate: -1.0 });
    sim.advance_time();
    assert!(matches!(reply.try_recv().unwrap(), CommandReply::Error(_)));
    assert_eq!(sim.clock_rate(), 4.0);
}

#[test]
fn property_get_and_set_round_trip() {
    let mut sim = started_sim(100.0);
    let mut platform = Platform::new("frigate");
    platform.set_name("intrepid");
    platform.set_side("red");
    sim.add_platform(platform).unwrap();

    let sender = sim.command_sender();
    let get_side = sender.send_with_reply(SimCommand::GetProperty {
        platform: "intrepid".to_string(),
        property: "side".to_string(),
    });
    sim.advance_time();
    assert_eq!(
        get_side.try_recv().unwrap(),
        CommandReply::Property(serde_json::json!("red"))
    );

    let set_side = sender.send_with_reply(SimCommand::SetProperty {
        platform: "intrepid".to_string(),
        property: "side".to_string(),
        value: serde_json::json!("blue"),
    });
    sim.advance_time();
    assert_eq!(set_side.try_recv().unwrap(), CommandReply::Ack);
    assert_eq!(sim.platform_by_name("intrepid").unwrap().side(), "blue");

    let unknown = sender.send_with_reply(SimCommand::GetProperty {
        platform: "intrepid".to_string(),
        property: "altitude".to_string(),
    });
    sim.advance_time();
    assert!(matches!(unknown.try_recv().unwrap(), CommandReply::Error(_)));

    let missing = sender.send_with_reply(SimCommand::GetProperty {
        platform: "nobody".to_string(),
        property: "side".to_string(),
    });
    sim.advance_time();
    assert!(matches!(missing.try_recv().unwrap(), CommandReply::Error(_)));
}

#[test]
fn terminate_command_finishes_the_run() {
    let mut sim = started_sim(1000.0);
    let sender = sim.command_sender();
    sender.send(SimCommand::Terminate);

    sim.run_to_completion();
    assert_eq!(sim.state(), SimState::Complete);
    assert_eq!(sim.completion_reason(), CompletionReason::Terminate);
}

#[test]
fn advance_to_time_drives_a_paused_simulation() {
    let mut sim = started_sim(100.0);
    let fired = Arc::new(Mutex::new(Vec::new()));
    for &t in &[5.0, 15.0] {
        let fired = Arc::clone(&fired);
        sim.add_event(Box::new(OneShotEvent::new(t, move |_sim| {
            fired.lock().unwrap().push(t);
        })))
        .unwrap();
    }

    let sender = sim.command_sender();
    sender.send(SimCommand::Pause);
    sim.advance_time();
    assert!(fired.lock().unwrap().is_empty());

    // Step the paused simulation forward to T = 10: the 5.0 event runs,
    // the 15.0 event stays pending.
    sender.send(SimCommand::AdvanceToTime { time: 10.0 });
    sim.advance_time();
    assert_eq!(*fired.lock().unwrap(), vec![5.0]);

    sender.send(SimCommand::Resume);
    sim.advance_time();
    assert_eq!(*fired.lock().unwrap(), vec![5.0, 15.0]);
}

#[test]
fn reset_command_requests_a_reset_completion() {
    let mut sim = started_sim(1000.0);
    let sender = sim.command_sender();
    sender.send(SimCommand::Reset);
    sim.run_to_completion();
    assert_eq!(sim.completion_reason(), CompletionReason::Reset);
    assert!(sim.should_execute());
}
