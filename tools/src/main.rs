//! sim-runner: headless runner for tacsim scenarios.
//!
//! Usage:
//!   sim-runner --scenario scenario.json --mode es --seed 12345
//!   sim-runner --mode rt --rate 2.0 --end-time 120
//!
//! In real-time mode, JSON commands are accepted on stdin while the
//! simulation runs, one per line:
//!   {"cmd":"pause"}
//!   {"cmd":"set_clock_rate","rate":4.0}
//!   {"cmd":"terminate"}

mod demo;

use anyhow::{Context, Result};
use std::env;
use std::io::BufRead;
use std::sync::Arc;
use tacsim_core::{
    CommandSender, EventRecorder, Platform, Scenario, SimCommand, SimStore, Simulation,
    SimulationMode,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let runs = parse_arg(&args, "--runs", 1u32);
    let frame_time = parse_arg(&args, "--frame-time", 1.0f64);
    let scenario_path = string_arg(&args, "--scenario");
    let db = string_arg(&args, "--db").unwrap_or_else(|| ":memory:".to_string());

    let mut scenario = Scenario::new("demo");
    demo::register_demo_components(&mut scenario);
    match &scenario_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario file {path}"))?;
            let file = Scenario::from_json(&json)?;
            scenario.apply_file(&file)?;
        }
        None => {
            build_demo_scenario(&mut scenario)?;
            scenario.set_end_time(300.0);
        }
    }

    // Explicit command-line flags override the scenario file.
    if let Some(mode_flag) = string_arg(&args, "--mode") {
        let mode = match mode_flag.as_str() {
            "es" => SimulationMode::EventStepped,
            "fs" => SimulationMode::FrameStepped { frame_time },
            "rt" => SimulationMode::RealTime,
            other => anyhow::bail!("unknown mode '{other}' (expected es, fs, or rt)"),
        };
        scenario.set_mode(mode);
    }
    if let Some(seed) = string_arg(&args, "--seed") {
        scenario.set_initial_seed(seed.parse().context("--seed expects an integer")?);
    }
    if let Some(end_time) = string_arg(&args, "--end-time") {
        scenario.set_end_time(end_time.parse().context("--end-time expects seconds")?);
    }
    if let Some(rate) = string_arg(&args, "--rate") {
        scenario.set_clock_rate(rate.parse().context("--rate expects a number")?);
    }
    if args.iter().any(|a| a == "--flexible") {
        scenario.set_flexible_realtime(true);
    }
    scenario.complete_load();
    let scenario = Arc::new(scenario);

    println!("tacsim — sim-runner");
    println!("  scenario:  {}", scenario.name());
    println!("  mode:      {:?}", scenario.mode());
    println!("  seed:      {}", scenario.initial_seed());
    println!("  end time:  {}", scenario.end_time());
    println!("  runs:      {runs}");
    println!("  db:        {db}");
    println!();

    // For :memory: use a shared-cache URI so the recorder connection and
    // the summary connection see the same database.
    let db_effective = if db == ":memory:" {
        format!("file:simrun_{}?mode=memory&cache=shared", uuid::Uuid::new_v4().simple())
    } else {
        db.clone()
    };
    let store = SimStore::open(&db_effective)?;
    store.migrate()?;

    for run_number in 1..=runs {
        let run_id = format!("run-{run_number}-{}", uuid::Uuid::new_v4().simple());
        let run_seed = scenario.seed_for_run(run_number);
        store.insert_run(&run_id, run_seed, env!("CARGO_PKG_VERSION"))?;

        let mut sim = Simulation::new(Arc::clone(&scenario), run_number)?;
        let recorder_store = SimStore::open(&db_effective)?;
        let recorder = EventRecorder::new(recorder_store, run_id.clone());
        recorder.record_run_initialized(run_seed);
        sim.add_observer(Box::new(recorder));

        if scenario.mode() == SimulationMode::RealTime {
            spawn_command_reader(sim.command_sender());
        }

        // A reset-completion loops back for another pass over the same
        // scenario; anything else finishes the run.
        while sim.should_execute() {
            sim.initialize()?;
            sim.start()?;
            let final_time = sim.run_to_completion();
            println!(
                "run {run_number}: {} at T = {final_time:.3}",
                sim.completion_reason().as_str().to_lowercase()
            );
        }

        print_summary(&store, &run_id)?;
    }

    Ok(())
}

/// Two platform types, three platforms, no scenario file needed.
fn build_demo_scenario(scenario: &mut Scenario) -> Result<()> {
    scenario.set_initial_seed(42);

    let mut uav = Platform::new("uav");
    uav.add_component(scenario.create_component("scan_sensor", &serde_json::json!({
        "name": "eo_scanner",
        "update_interval": 5.0,
    }))?)?;
    scenario.define_platform_type(uav);

    let mut site = Platform::new("radar_site");
    site.add_component(scenario.create_component("scan_sensor", &serde_json::json!({
        "name": "search_radar",
        "update_interval": 10.0,
    }))?)?;
    site.add_component(scenario.create_component("identity_tag", &serde_json::json!({
        "name": "marking",
        "value": "EW-1",
    }))?)?;
    scenario.define_platform_type(site);

    let mut red_uav = scenario.instantiate_type("uav")?;
    red_uav.set_name("raven-1");
    red_uav.set_side("red");
    scenario.add_input_platform(red_uav);

    let mut blue_uav = scenario.instantiate_type("uav")?;
    blue_uav.set_name("hawk-1");
    blue_uav.set_side("blue");
    blue_uav.set_creation_time(30.0);
    scenario.add_input_platform(blue_uav);

    let mut ew_site = scenario.instantiate_type("radar_site")?;
    ew_site.set_name("ew-north");
    ew_site.set_side("blue");
    ew_site.set_sign("EWN");
    scenario.add_input_platform(ew_site);

    Ok(())
}

/// Feed stdin JSON lines into the simulation's command queue.
fn spawn_command_reader(sender: CommandSender) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SimCommand>(trimmed) {
                Ok(command) => sender.send(command),
                Err(err) => log::warn!("bad command line: {err}"),
            }
        }
    });
}

fn print_summary(store: &SimStore, run_id: &str) -> Result<()> {
    let total = store.event_count(run_id)?;
    let added = store.events_of_type(run_id, "platform_added")?.len();
    let deleted = store.events_of_type(run_id, "platform_deleted")?.len();
    let turned_on = store.events_of_type(run_id, "part_turned_on")?.len();

    println!("=== RUN SUMMARY ===");
    println!("  run_id:             {run_id}");
    println!("  log entries:        {total}");
    println!("  platforms added:    {added}");
    println!("  platforms deleted:  {deleted}");
    println!("  parts turned on:    {turned_on}");
    println!();
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}
