//! The simulation — the main controller of a run.
//!
//! LIFECYCLE (one-directional, documented, never reordered):
//!   PendingInitialize → Initializing → PendingStart → Starting →
//!   Active → PendingComplete → Complete
//! An explicit reset is the only way back to PendingInitialize.
//!
//! RULES:
//!   - Exactly one event executes at a time; external commands are
//!     drained only between events, never during one.
//!   - Events with equal times execute in scheduling order.
//!   - All randomness flows through the simulation's RNG streams.
//!   - Persistent references to platforms are indices, never borrows.

use crate::{
    clock::{create_clock, ClockSource, SimulationMode},
    command::{CommandQueue, CommandReply, CommandSender, SimCommand},
    component::InitContext,
    error::{SimError, SimResult},
    event::{Event, EventDisposition, EventId, EventQueue, OneShotEvent},
    observer::SimulationObserver,
    pacing::PacingMonitor,
    platform::{OnBrokenAction, Platform},
    rng::{SimRng, StreamSlot},
    scenario::Scenario,
    types::{PlatformIndex, SimTime},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The state of the simulation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    PendingInitialize,
    Initializing,
    PendingStart,
    Starting,
    Active,
    PendingComplete,
    Complete,
}

impl SimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingInitialize => "PENDING_INITIALIZE",
            Self::Initializing => "INITIALIZING",
            Self::PendingStart => "PENDING_START",
            Self::Starting => "STARTING",
            Self::Active => "ACTIVE",
            Self::PendingComplete => "PENDING_COMPLETE",
            Self::Complete => "COMPLETE",
        }
    }
}

/// Why the simulation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionReason {
    /// Not in a completing state.
    #[default]
    None,
    EndTimeReached,
    Reset,
    Terminate,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::EndTimeReached => "END_TIME_REACHED",
            Self::Reset => "RESET",
            Self::Terminate => "TERMINATED",
        }
    }
}

/// Margin past which a requested platform add becomes a scheduled event
/// instead of an immediate add.
const DEFERRED_ADD_MARGIN: SimTime = 0.01;

pub struct Simulation {
    scenario: Arc<Scenario>,
    run_number: u32,
    state: SimState,
    completion_reason: CompletionReason,

    sim_time: SimTime,
    end_time: SimTime,
    mode: SimulationMode,
    clock_rate: f64,
    flexible_realtime: bool,
    time_behind: f64,
    wall_start: Instant,

    events: EventQueue,
    clock: Box<dyn ClockSource>,
    commands: CommandQueue,
    observers: Vec<Box<dyn SimulationObserver>>,
    rng: SimRng,
    aux_rng: SimRng,
    pending_advance: Option<SimTime>,

    // Roster. `by_index` is index-organized with slot 0 reserved for
    // "no platform"; deleted platforms leave a None hole so their index
    // is never reassigned. `active` preserves addition order.
    active: Vec<PlatformIndex>,
    by_index: Vec<Option<Platform>>,
    by_name: HashMap<String, PlatformIndex>,
    by_sign: HashMap<String, PlatformIndex>,
    name_ids: Vec<String>,
    type_ids: Vec<String>,
    next_default_name: HashMap<String, u32>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("run_number", &self.run_number)
            .field("state", &self.state)
            .field("completion_reason", &self.completion_reason)
            .field("sim_time", &self.sim_time)
            .field("end_time", &self.end_time)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    pub fn new(scenario: Arc<Scenario>, run_number: u32) -> SimResult<Self> {
        if !scenario.load_is_complete() {
            return Err(SimError::ScenarioIncomplete);
        }
        let seed = scenario.seed_for_run(run_number);
        let mode = scenario.mode();
        let clock_rate = scenario.clock_rate();
        let mut clock = create_clock(mode);
        clock.set_rate(clock_rate);

        Ok(Self {
            end_time: scenario.end_time(),
            flexible_realtime: scenario.flexible_realtime(),
            scenario,
            run_number,
            state: SimState::PendingInitialize,
            completion_reason: CompletionReason::None,
            sim_time: 0.0,
            mode,
            clock_rate,
            time_behind: 0.0,
            wall_start: Instant::now(),
            events: EventQueue::new(),
            clock,
            commands: CommandQueue::new(),
            observers: Vec::new(),
            rng: StreamSlot::Core.stream(seed),
            aux_rng: StreamSlot::Aux.stream(seed),
            pending_advance: None,
            active: Vec::new(),
            by_index: vec![None],
            by_name: HashMap::new(),
            by_sign: HashMap::new(),
            name_ids: vec![String::new()],
            type_ids: vec![String::new()],
            next_default_name: HashMap::new(),
        })
    }

    // ── State & time accessors ─────────────────────────────────

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SimState::Active
    }

    pub fn completion_reason(&self) -> CompletionReason {
        self.completion_reason
    }

    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    pub fn run_number(&self) -> u32 {
        self.run_number
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn is_real_time(&self) -> bool {
        self.mode.is_real_time()
    }

    pub fn is_flexible_realtime(&self) -> bool {
        self.flexible_realtime
    }

    pub fn sim_time(&self) -> SimTime {
        self.sim_time
    }

    pub fn end_time(&self) -> SimTime {
        self.end_time
    }

    /// Change the end time, re-arming the end-of-run sentinel event if
    /// the run is underway.
    pub fn set_end_time(&mut self, end_time: SimTime) {
        self.end_time = end_time.max(0.0);
        if matches!(
            self.state,
            SimState::PendingStart | SimState::Starting | SimState::Active | SimState::PendingComplete
        ) {
            self.events
                .schedule(Box::new(OneShotEvent::noop(self.end_time + 1.0e-3)));
        }
    }

    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    pub fn set_clock_rate(&mut self, rate: f64) {
        if rate > 0.0 && (rate - self.clock_rate).abs() > f64::EPSILON {
            self.clock_rate = rate;
            self.clock.set_rate(rate);
            self.notify_clock_rate_changed(rate);
        }
    }

    /// How far simulation time lags the wall clock (real-time runs).
    pub fn time_behind(&self) -> f64 {
        self.time_behind
    }

    /// Wall-clock seconds since this simulation was constructed.
    pub fn wall_time(&self) -> f64 {
        self.wall_start.elapsed().as_secs_f64()
    }

    /// Time of the next pending event, or the current time if none.
    pub fn next_event_time(&mut self) -> SimTime {
        self.events.peek_time().unwrap_or(self.sim_time)
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    // ── RNG streams ────────────────────────────────────────────

    /// The core model stream. Auxiliary consumers use `aux_rng` so their
    /// draws never perturb core model sequences.
    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    pub fn aux_rng(&mut self) -> &mut SimRng {
        &mut self.aux_rng
    }

    // ── Observers & commands ───────────────────────────────────

    pub fn add_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Handle for delivering commands from other threads.
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Initialize the simulation: instantiate the scenario's platforms
    /// (bulk two-phase pass), schedule deferred creations and the end
    /// sentinel, and move to PendingStart.
    ///
    /// Fails with the offending platform/component identity on any
    /// configuration error; the simulation then remains un-started in
    /// PendingInitialize.
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.state == SimState::Complete && self.completion_reason == CompletionReason::Reset {
            self.reset();
        }
        if self.state != SimState::PendingInitialize {
            log::error!("simulation is already initialized (state {})", self.state.as_str());
            return Err(SimError::StateError {
                operation: "initialize",
                state: self.state.as_str(),
            });
        }
        self.set_state(SimState::Initializing);
        self.sim_time = 0.0;
        self.time_behind = 0.0;
        log::info!(
            "initializing run {} of scenario '{}' (seed {})",
            self.run_number,
            self.scenario.name(),
            self.scenario.seed_for_run(self.run_number)
        );

        match self.add_input_platforms() {
            Ok(()) => {
                self.events
                    .schedule(Box::new(OneShotEvent::noop(self.end_time + 1.0e-3)));
                self.set_state(SimState::PendingStart);
                Ok(())
            }
            Err(err) => {
                // Tear back down so a corrected scenario can try again.
                self.clear_run_state();
                self.set_state(SimState::PendingInitialize);
                Err(err)
            }
        }
    }

    /// Begin draining the event queue: PendingStart → Active.
    pub fn start(&mut self) -> SimResult<()> {
        if self.state != SimState::PendingStart {
            log::error!("simulation cannot be started from state {}", self.state.as_str());
            return Err(SimError::StateError {
                operation: "start",
                state: self.state.as_str(),
            });
        }
        self.set_state(SimState::Starting);
        self.completion_reason = CompletionReason::None;
        self.clock.reset();
        self.clock.set_rate(self.clock_rate);
        self.clock.start();
        self.set_state(SimState::Active);
        Ok(())
    }

    /// Dispatch the next batch of due events, advancing simulation time.
    /// Returns the new simulation time.
    pub fn advance_time(&mut self) -> SimTime {
        self.process_commands();
        if matches!(self.state, SimState::PendingComplete | SimState::Complete) {
            return self.sim_time;
        }
        if let Some(t) = self.pending_advance.take() {
            self.clock.set_clock(t.min(self.end_time));
        }
        let requested = self.events.peek_time().unwrap_or(self.end_time + 0.1);
        let new_time = self.clock.clock(requested).max(self.sim_time);
        self.sim_time = new_time;
        self.notify_advance(new_time);
        if new_time > self.end_time && self.state == SimState::Active {
            self.set_state(SimState::PendingComplete);
        }
        self.dispatch_events(new_time);
        if self.mode.is_real_time() {
            let wall = self.clock.clock(f64::MAX);
            self.time_behind = (wall - self.sim_time).max(0.0);
        }
        self.sim_time
    }

    /// Dispatch events due at or before `target` and advance simulation
    /// time exactly to it (frame-stepped executive).
    pub fn advance_to_time(&mut self, target: SimTime) -> SimTime {
        self.process_commands();
        if matches!(self.state, SimState::PendingComplete | SimState::Complete) {
            return self.sim_time;
        }
        if let Some(t) = self.pending_advance.take() {
            self.clock.set_clock(t.min(self.end_time));
        }
        let new_time = self.clock.clock(target).max(self.sim_time);
        self.sim_time = new_time;
        self.notify_advance(new_time);
        if new_time > self.end_time && self.state == SimState::Active {
            self.set_state(SimState::PendingComplete);
        }
        self.dispatch_events(new_time);
        self.sim_time
    }

    /// The blocking point for real-time pacing. A no-op for pure
    /// event-stepped runs; for paused runs of any mode it sleeps until a
    /// command resumes the clock, so the run loop does not spin.
    pub fn wait_for_advance_time(&mut self) {
        if !self.mode.is_real_time() {
            while self.clock.is_stopped()
                && self.state == SimState::Active
                && self.pending_advance.is_none()
            {
                self.process_commands();
                if !self.clock.is_stopped() || self.pending_advance.is_some() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(2));
            }
            return;
        }
        loop {
            self.process_commands();
            if self.state != SimState::Active || self.pending_advance.is_some() {
                return;
            }
            if self.clock.is_stopped() {
                std::thread::sleep(Duration::from_millis(2));
                continue;
            }
            let next = match self.events.peek_time() {
                Some(t) => t.min(self.end_time),
                None => return,
            };
            let now = self.clock.clock(next);
            if now >= next {
                return;
            }
            // Sleep in short slices so inbound commands stay responsive.
            let wall_wait = ((next - now) / self.clock.rate().max(1.0e-9)).clamp(5.0e-4, 5.0e-3);
            std::thread::sleep(Duration::from_secs_f64(wall_wait));
        }
    }

    /// The canonical run loop: wait, advance, report, until no longer
    /// active; then complete. Returns the final simulation time.
    pub fn run_to_completion(&mut self) -> SimTime {
        let mut monitor = PacingMonitor::new(self.scenario.pacing().clone());
        while self.is_active() {
            self.wait_for_advance_time();
            let sim_time = match self.mode {
                SimulationMode::FrameStepped { frame_time } => {
                    let target = self.sim_time + frame_time;
                    self.advance_to_time(target)
                }
                _ => self.advance_time(),
            };
            let behind = self.mode.is_real_time().then_some(self.time_behind);
            monitor.on_advance(sim_time, behind, self.flexible_realtime);
        }
        let final_time = self.sim_time.min(self.end_time);
        self.complete(final_time);
        final_time
    }

    /// Record completion, stop the clock, and tear down the run.
    /// Remaining platforms are deleted through the normal deletion path
    /// so they see the same callbacks as any mid-run deletion.
    pub fn complete(&mut self, sim_time: SimTime) {
        if !matches!(self.state, SimState::Active | SimState::PendingComplete) {
            log::warn!(
                "completing simulation from unexpected state {} (expected ACTIVE or PENDING_COMPLETE)",
                self.state.as_str()
            );
        }
        self.set_state(SimState::Complete);
        if self.completion_reason == CompletionReason::None && self.sim_time >= self.end_time {
            self.completion_reason = CompletionReason::EndTimeReached;
        }
        self.clock.stop();
        let reason = self.completion_reason;
        self.notify_simulation_complete(sim_time, reason);
        // Remaining platforms leave through the normal deletion path so
        // they get the same callbacks as a mid-run deletion.
        while let Some(&index) = self.active.first() {
            self.process_remove_platform(sim_time, index);
        }
        log::info!(
            "simulation complete at T = {sim_time:.3} ({})",
            reason.as_str()
        );
        self.clear_run_state();
        self.clock.reset();
    }

    /// Ask the run loop to finish with a Reset completion, after which
    /// `should_execute` reports true and `initialize` rebuilds the run.
    pub fn request_reset(&mut self) {
        if self.state != SimState::Active {
            log::warn!("reset requested from unexpected state {}", self.state.as_str());
        }
        self.state = SimState::PendingComplete;
        self.completion_reason = CompletionReason::Reset;
    }

    /// Ask the run loop to finish with a Terminate completion.
    pub fn request_termination(&mut self) {
        if self.state != SimState::Active {
            log::warn!("termination requested from unexpected state {}", self.state.as_str());
        }
        self.state = SimState::PendingComplete;
        self.completion_reason = CompletionReason::Terminate;
    }

    /// Tear the whole run down to a fresh PendingInitialize: empty
    /// roster, empty event queue, reseeded RNG streams. The scenario
    /// catalogue is untouched.
    pub fn reset(&mut self) {
        let sim_time = self.sim_time;
        while let Some(&index) = self.active.first() {
            self.process_remove_platform(sim_time, index);
        }
        self.clear_run_state();
        self.clock.reset();
        self.sim_time = 0.0;
        self.time_behind = 0.0;
        self.pending_advance = None;
        let seed = self.scenario.seed_for_run(self.run_number);
        self.rng = StreamSlot::Core.stream(seed);
        self.aux_rng = StreamSlot::Aux.stream(seed);
        self.completion_reason = CompletionReason::None;
        self.set_state(SimState::PendingInitialize);
    }

    /// Whether another initialize/start/advance cycle should run: true
    /// for a fresh simulation and after a reset-completion.
    pub fn should_execute(&self) -> bool {
        self.state == SimState::PendingInitialize
            || (self.state == SimState::Complete && self.completion_reason == CompletionReason::Reset)
    }

    pub fn pause(&mut self) {
        if self.state == SimState::Active && !self.clock.is_stopped() {
            self.clock.stop();
            log::info!("simulation paused at T = {:.3}", self.sim_time);
        }
    }

    pub fn resume(&mut self) {
        if self.state == SimState::Active && self.clock.is_stopped() {
            self.clock.start();
            log::info!("simulation resumed at T = {:.3}", self.sim_time);
        }
    }

    // ── Events ─────────────────────────────────────────────────

    /// Queue an event. Scheduling into the past is a programming error
    /// and is rejected, never clamped.
    pub fn add_event(&mut self, event: Box<dyn Event>) -> SimResult<EventId> {
        let event_time = event.time();
        if event_time < self.sim_time {
            log::error!(
                "rejected event scheduled in the past: event time {event_time}, sim time {}",
                self.sim_time
            );
            return Err(SimError::EventInPast {
                event_time,
                sim_time: self.sim_time,
            });
        }
        Ok(self.events.schedule(event))
    }

    /// Cancel a queued event by identity. Only possible before it pops.
    pub fn cancel_event(&mut self, id: EventId) -> bool {
        self.events.cancel(id)
    }

    /// Re-release an event parked by the Hold disposition.
    pub fn release_held_event(&mut self, id: EventId, time: SimTime) -> SimResult<EventId> {
        if time < self.sim_time {
            return Err(SimError::EventInPast {
                event_time: time,
                sim_time: self.sim_time,
            });
        }
        self.events.release_held(id, time).ok_or_else(|| {
            SimError::Other(anyhow::anyhow!("no held event with the given id"))
        })
    }

    fn dispatch_events(&mut self, up_to: SimTime) {
        loop {
            match self.events.peek_time() {
                Some(t) if t <= up_to => {}
                _ => break,
            }
            let (id, _event_time, mut event) = match self.events.pop_next() {
                Some(popped) => popped,
                None => break,
            };
            match event.execute(self) {
                EventDisposition::Delete => {}
                EventDisposition::Reschedule(next_time) => {
                    self.events.schedule_at(next_time, event);
                }
                EventDisposition::Hold => {
                    self.events.hold(id, event);
                }
            }
            // Commands apply between events, never during one.
            self.process_commands();
        }
    }

    // ── External commands ──────────────────────────────────────

    fn process_commands(&mut self) {
        for queued in self.commands.drain() {
            log::debug!("command: {:?}", queued.command);
            match queued.command.clone() {
                SimCommand::Pause => {
                    self.pause();
                    queued.respond(CommandReply::Ack);
                }
                SimCommand::Resume => {
                    self.resume();
                    queued.respond(CommandReply::Ack);
                }
                SimCommand::SetClockRate { rate } => {
                    if rate > 0.0 {
                        self.set_clock_rate(rate);
                        queued.respond(CommandReply::Ack);
                    } else {
                        queued.respond(CommandReply::Error(format!(
                            "clock rate must be positive, got {rate}"
                        )));
                    }
                }
                SimCommand::AdvanceToTime { time } => {
                    if time < self.sim_time {
                        queued.respond(CommandReply::Error(format!(
                            "cannot advance backwards to {time} from {}",
                            self.sim_time
                        )));
                    } else {
                        self.pending_advance = Some(time);
                        queued.respond(CommandReply::Ack);
                    }
                }
                SimCommand::Terminate => {
                    self.request_termination();
                    queued.respond(CommandReply::Ack);
                }
                SimCommand::Reset => {
                    self.request_reset();
                    queued.respond(CommandReply::Ack);
                }
                SimCommand::SetProperty { platform, property, value } => {
                    let reply = self.set_platform_property(&platform, &property, value);
                    queued.respond(reply);
                }
                SimCommand::GetProperty { platform, property } => {
                    let reply = self.get_platform_property(&platform, &property);
                    queued.respond(reply);
                }
            }
        }
    }

    fn get_platform_property(&self, platform: &str, property: &str) -> CommandReply {
        let Some(&index) = self.by_name.get(platform) else {
            return CommandReply::Error(format!("no platform named '{platform}'"));
        };
        let Some(platform) = self.by_index[index].as_ref() else {
            return CommandReply::Error(format!("platform '{platform}' no longer exists"));
        };
        match property {
            "name" => CommandReply::Property(json!(platform.name())),
            "type" => CommandReply::Property(json!(platform.type_name())),
            "side" => CommandReply::Property(json!(platform.side())),
            "sign" => CommandReply::Property(json!(platform.sign())),
            "icon" => CommandReply::Property(json!(platform.icon())),
            "index" => CommandReply::Property(json!(platform.index())),
            "broken" => CommandReply::Property(json!(platform.is_broken())),
            _ => CommandReply::Error(format!("unknown property '{property}'")),
        }
    }

    fn set_platform_property(&mut self, platform: &str, property: &str, value: Value) -> CommandReply {
        let Some(&index) = self.by_name.get(platform) else {
            return CommandReply::Error(format!("no platform named '{platform}'"));
        };
        let Some(platform) = self.by_index[index].as_mut() else {
            return CommandReply::Error(format!("platform '{platform}' no longer exists"));
        };
        let Some(text) = value.as_str() else {
            return CommandReply::Error(format!("property '{property}' expects a string value"));
        };
        match property {
            "side" => {
                platform.set_side(text);
                CommandReply::Ack
            }
            "icon" => {
                platform.set_icon(text);
                CommandReply::Ack
            }
            "sign" => {
                let old = platform.sign().to_string();
                platform.set_sign(text);
                if !old.is_empty() {
                    self.by_sign.remove(&old);
                }
                if !text.is_empty() {
                    self.by_sign.insert(text.to_string(), index);
                }
                CommandReply::Ack
            }
            _ => CommandReply::Error(format!("property '{property}' is not writable")),
        }
    }

    // ── Platform roster ────────────────────────────────────────

    pub fn platform_count(&self) -> usize {
        self.active.len()
    }

    /// Entry from the active list (addition order). Not the same as the
    /// platform index.
    pub fn platform_entry(&self, entry: usize) -> Option<&Platform> {
        let index = *self.active.get(entry)?;
        self.by_index[index].as_ref()
    }

    pub fn platform_exists(&self, index: PlatformIndex) -> bool {
        self.by_index.get(index).map_or(false, |p| p.is_some())
    }

    pub fn platform_by_index(&self, index: PlatformIndex) -> Option<&Platform> {
        self.by_index.get(index)?.as_ref()
    }

    pub fn platform_by_index_mut(&mut self, index: PlatformIndex) -> Option<&mut Platform> {
        self.by_index.get_mut(index)?.as_mut()
    }

    pub fn platform_by_name(&self, name: &str) -> Option<&Platform> {
        let &index = self.by_name.get(name)?;
        self.by_index[index].as_ref()
    }

    pub fn platform_by_sign(&self, sign: &str) -> Option<&Platform> {
        let &index = self.by_sign.get(sign)?;
        self.by_index[index].as_ref()
    }

    /// Name of a platform, even after it has been deleted.
    pub fn platform_name_of(&self, index: PlatformIndex) -> Option<&str> {
        self.name_ids.get(index).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// Type of a platform, even after it has been deleted.
    pub fn platform_type_of(&self, index: PlatformIndex) -> Option<&str> {
        self.type_ids.get(index).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// Add a platform at the current simulation time. The simulation
    /// takes ownership; the new index is returned.
    pub fn add_platform(&mut self, platform: Platform) -> SimResult<PlatformIndex> {
        if matches!(self.state, SimState::PendingInitialize) {
            return Err(SimError::StateError {
                operation: "add a platform",
                state: self.state.as_str(),
            });
        }
        let sim_time = self.sim_time;
        let mut platform = platform;
        self.assign_default_name(&mut platform);
        if self.by_name.contains_key(platform.name()) {
            return Err(SimError::DuplicatePlatformName {
                name: platform.name().to_string(),
            });
        }
        let index = self.insert_roster(platform);
        self.notify_platform_added(sim_time, index);

        match self.initialize_platform(sim_time, index) {
            Ok(()) => {
                self.introduce_platform(sim_time, index);
                self.notify_platform_initialized(sim_time, index);
                self.turn_on_systems(sim_time, index);
                log::debug!(
                    "T = {sim_time:.3} platform added: {} (index {index})",
                    self.name_ids[index]
                );
                Ok(index)
            }
            Err(err) => {
                // Back out so the roster never holds a half-built platform.
                self.process_remove_platform(sim_time, index);
                Err(err)
            }
        }
    }

    /// Add a platform now, or schedule its creation if `sim_time` is far
    /// enough in the future. Returns the index for an immediate add.
    pub fn add_platform_at(
        &mut self,
        sim_time: SimTime,
        platform: Platform,
    ) -> SimResult<Option<PlatformIndex>> {
        if sim_time - self.sim_time > DEFERRED_ADD_MARGIN {
            let mut platform = platform;
            platform.set_creation_time(sim_time);
            self.add_event(Box::new(AddPlatformEvent {
                time: sim_time,
                platform: Some(platform),
            }))?;
            Ok(None)
        } else {
            self.add_platform(platform).map(Some)
        }
    }

    /// Schedule a platform for deletion. The platform is marked deleted
    /// immediately but physically removed by a same-time event, so the
    /// caller (often a part of that very platform) stays valid until the
    /// current event completes.
    pub fn delete_platform(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
            log::warn!("attempted to delete platform index {index}, which does not exist");
            return;
        };
        if platform.is_deleted() {
            return;
        }
        platform.set_deleted();
        let time = sim_time.max(self.sim_time);
        self.events
            .schedule_at(time, Box::new(RemovePlatformEvent { time, index }));
    }

    pub(crate) fn process_remove_platform(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.take()) else {
            return;
        };
        self.active.retain(|&i| i != index);
        self.by_name.remove(platform.name());
        if !platform.sign().is_empty() {
            if self.by_sign.get(platform.sign()) == Some(&index) {
                self.by_sign.remove(platform.sign());
            }
        }
        let others: Vec<PlatformIndex> = self.active.clone();
        for other in others {
            if let Some(p) = self.by_index[other].as_mut() {
                p.platform_deleted(index);
            }
        }
        self.notify_platform_deleted(sim_time, &platform);
        log::debug!(
            "T = {sim_time:.3} platform deleted: {} (index {index})",
            platform.name()
        );
    }

    fn insert_roster(&mut self, mut platform: Platform) -> PlatformIndex {
        let index = self.by_index.len();
        platform.assign_index(index);
        self.by_name.insert(platform.name().to_string(), index);
        if !platform.sign().is_empty() {
            self.by_sign.insert(platform.sign().to_string(), index);
        }
        self.name_ids.push(platform.name().to_string());
        self.type_ids.push(platform.type_name().to_string());
        self.active.push(index);
        self.by_index.push(Some(platform));
        index
    }

    /// Assign a `<type>:<n>` name if none was provided.
    fn assign_default_name(&mut self, platform: &mut Platform) {
        if !platform.name().is_empty() && platform.name() != "<default>" {
            return;
        }
        let counter = self
            .next_default_name
            .entry(platform.type_name().to_string())
            .or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}:{}", platform.type_name(), counter);
            if !self.by_name.contains_key(&candidate) {
                platform.set_name(candidate);
                return;
            }
        }
    }

    fn initialize_platform(&mut self, sim_time: SimTime, index: PlatformIndex) -> SimResult<()> {
        self.run_platform_phase(sim_time, index, InitPhase::One)?;
        self.run_platform_phase(sim_time, index, InitPhase::Two)
    }

    fn run_platform_phase(
        &mut self,
        sim_time: SimTime,
        index: PlatformIndex,
        phase: InitPhase,
    ) -> SimResult<()> {
        let run_number = self.run_number;
        let Some(platform) = self.by_index[index].as_mut() else {
            return Ok(());
        };
        let mut ctx = InitContext {
            run_number,
            rng: &mut self.aux_rng,
        };
        let result = match phase {
            InitPhase::One => platform.initialize(sim_time, &mut ctx),
            InitPhase::Two => platform.initialize2(sim_time, &mut ctx),
        };
        result.map_err(|component| {
            log::error!(
                "platform '{}' failed {} initialization in component '{component}'",
                platform.name(),
                phase.label()
            );
            SimError::PlatformInitialization {
                platform: platform.name().to_string(),
                component,
            }
        })
    }

    /// Introduce a new platform and the existing platforms to each other.
    fn introduce_platform(&mut self, sim_time: SimTime, new_index: PlatformIndex) {
        let others: Vec<PlatformIndex> = self.active.clone();
        for other in others {
            if other == new_index {
                continue;
            }
            if let Some(p) = self.by_index[new_index].as_mut() {
                p.platform_added(sim_time, other);
            }
            if let Some(p) = self.by_index[other].as_mut() {
                p.platform_added(sim_time, new_index);
            }
        }
    }

    /// Instantiate and bulk-initialize the scenario's input platforms:
    /// phase one for all, then phase two for all, then introduction and
    /// initial turn-on. Platforms with a future creation time enter
    /// through a scheduled event instead.
    fn add_input_platforms(&mut self) -> SimResult<()> {
        let inputs: Vec<Platform> = self.scenario.input_platforms().cloned().collect();
        let mut ready: Vec<PlatformIndex> = Vec::new();

        for mut platform in inputs {
            if platform.creation_time() > 0.0 {
                let time = platform.creation_time();
                self.add_event(Box::new(AddPlatformEvent {
                    time,
                    platform: Some(platform),
                }))?;
                continue;
            }
            self.assign_default_name(&mut platform);
            if self.by_name.contains_key(platform.name()) {
                return Err(SimError::DuplicatePlatformName {
                    name: platform.name().to_string(),
                });
            }
            let index = self.insert_roster(platform);
            ready.push(index);
            self.notify_platform_added(0.0, index);
        }

        for &index in &ready {
            self.run_platform_phase(0.0, index, InitPhase::One)?;
        }
        for &index in &ready {
            self.run_platform_phase(0.0, index, InitPhase::Two)?;
        }
        for &index in &ready {
            self.introduce_platform(0.0, index);
            self.notify_platform_initialized(0.0, index);
            self.turn_on_systems(0.0, index);
        }
        log::info!("{} input platform(s) initialized", ready.len());
        Ok(())
    }

    // ── Part control ───────────────────────────────────────────

    /// Turn on every operational, undamaged part marked initially-on.
    fn turn_on_systems(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let part_names: Vec<String> = match self.by_index[index].as_ref() {
            Some(platform) => platform
                .components()
                .parts()
                .filter(|part| {
                    let state = part.part();
                    state.is_operational() && state.damage_factor() < 1.0 && state.initially_on()
                })
                .map(|part| part.component_name().to_string())
                .collect(),
            None => return,
        };
        for name in part_names {
            self.turn_part_on(sim_time, index, &name);
        }
    }

    /// Turn a part on, starting its periodic update event.
    /// Returns false if the part cannot be turned on (already on, not
    /// operational, or fully damaged).
    pub fn turn_part_on(&mut self, sim_time: SimTime, index: PlatformIndex, part_name: &str) -> bool {
        let mut scheduled = None;
        {
            let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
                return false;
            };
            let Some(part) = platform.components_mut().part_by_name_mut(part_name) else {
                return false;
            };
            if !part.part().can_be_turned_on() {
                return false;
            }
            part.turn_on(sim_time);
            let epoch = part.part_mut().bump_update_epoch();
            let interval = part.part().update_interval();
            if interval > 0.0 {
                scheduled = Some((sim_time + interval, epoch));
            }
        }
        if let Some((time, epoch)) = scheduled {
            self.events.schedule_at(
                time,
                Box::new(PartUpdateEvent {
                    time,
                    platform_index: index,
                    part_name: part_name.to_string(),
                    epoch,
                }),
            );
        }
        self.notify_part_status(sim_time, index, part_name, true);
        true
    }

    /// Turn a part off, invalidating its periodic update event.
    pub fn turn_part_off(&mut self, sim_time: SimTime, index: PlatformIndex, part_name: &str) -> bool {
        {
            let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
                return false;
            };
            let Some(part) = platform.components_mut().part_by_name_mut(part_name) else {
                return false;
            };
            if !part.part().is_turned_on() {
                return false;
            }
            part.turn_off(sim_time);
            part.part_mut().bump_update_epoch();
        }
        self.notify_part_status(sim_time, index, part_name, false);
        true
    }

    /// Change a part's operational state. Going non-operational turns
    /// the part off first.
    pub fn set_part_operational(
        &mut self,
        sim_time: SimTime,
        index: PlatformIndex,
        part_name: &str,
        operational: bool,
    ) -> bool {
        if !operational {
            self.turn_part_off(sim_time, index, part_name);
        }
        let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
            return false;
        };
        let Some(part) = platform.components_mut().part_by_name_mut(part_name) else {
            return false;
        };
        part.set_operational(sim_time, operational)
    }

    /// Change how often a part's update event fires. A non-positive
    /// interval deactivates periodic updates.
    pub fn set_part_update_interval(
        &mut self,
        sim_time: SimTime,
        index: PlatformIndex,
        part_name: &str,
        interval: SimTime,
    ) {
        let mut scheduled = None;
        {
            let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
                return;
            };
            let Some(part) = platform.components_mut().part_by_name_mut(part_name) else {
                return;
            };
            part.part_mut().set_update_interval(interval);
            let epoch = part.part_mut().bump_update_epoch();
            if part.part().is_turned_on() && interval > 0.0 {
                scheduled = Some((sim_time + interval, epoch));
            }
        }
        if let Some((time, epoch)) = scheduled {
            self.events.schedule_at(
                time,
                Box::new(PartUpdateEvent {
                    time,
                    platform_index: index,
                    part_name: part_name.to_string(),
                    epoch,
                }),
            );
        }
    }

    /// Apply damage to a part. Total damage forces the part off and
    /// non-operational; a critical part's death breaks the platform; a
    /// restorable part with a recovery time schedules its restoration.
    pub fn set_part_damage(
        &mut self,
        sim_time: SimTime,
        index: PlatformIndex,
        part_name: &str,
        damage: f64,
    ) -> bool {
        let damage = damage.clamp(0.0, 1.0);
        let (went_mortal, critical, recovery) = {
            let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
                return false;
            };
            let Some(part) = platform.components_mut().part_by_name_mut(part_name) else {
                return false;
            };
            if part.part().is_broken() || (part.part().damage_factor() - damage).abs() < f64::EPSILON {
                return false;
            }
            part.part_mut().set_damage_raw(damage);
            let mortal = damage >= 1.0;
            (
                mortal,
                part.part().is_critical(),
                (part.part().is_restorable() && part.part().automatic_recovery_time() > 0.0)
                    .then(|| part.part().automatic_recovery_time()),
            )
        };
        if !went_mortal {
            return true;
        }
        self.turn_part_off(sim_time, index, part_name);
        self.set_part_operational(sim_time, index, part_name, false);
        if critical {
            self.platform_broken(sim_time, index);
        } else if let Some(recovery_time) = recovery {
            let time = sim_time + recovery_time;
            self.events.schedule_at(
                time,
                Box::new(PartRestorationEvent {
                    time,
                    platform_index: index,
                    part_name: part_name.to_string(),
                }),
            );
        }
        true
    }

    /// Handle a broken platform according to its on-broken action.
    pub fn platform_broken(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let (action, part_names) = {
            let Some(platform) = self.by_index.get_mut(index).and_then(|p| p.as_mut()) else {
                return;
            };
            platform.set_broken();
            let names: Vec<String> = platform
                .components()
                .parts()
                .map(|p| p.component_name().to_string())
                .collect();
            (platform.on_broken_action(), names)
        };
        self.notify_platform_broken(sim_time, index);
        match action {
            OnBrokenAction::Remove => self.delete_platform(sim_time, index),
            OnBrokenAction::Disable => {
                for name in part_names {
                    self.set_part_operational(sim_time, index, &name, false);
                }
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────

    fn set_state(&mut self, state: SimState) {
        if self.state == state {
            return;
        }
        log::debug!("state {} -> {}", self.state.as_str(), state.as_str());
        self.state = state;
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.state_changed(state);
        }
        self.observers.append(&mut observers);
    }

    /// Drop the roster and all pending events. The persistent name/type
    /// tables go with them; slot 0 stays reserved.
    fn clear_run_state(&mut self) {
        self.active.clear();
        self.by_index.clear();
        self.by_index.push(None);
        self.by_name.clear();
        self.by_sign.clear();
        self.name_ids.clear();
        self.name_ids.push(String::new());
        self.type_ids.clear();
        self.type_ids.push(String::new());
        self.next_default_name.clear();
        self.events.clear();
    }

    fn notify_advance(&mut self, sim_time: SimTime) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.advance_time(sim_time);
        }
        self.observers.append(&mut observers);
    }

    fn notify_clock_rate_changed(&mut self, rate: f64) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.clock_rate_changed(rate);
        }
        self.observers.append(&mut observers);
    }

    fn notify_platform_added(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let mut observers = std::mem::take(&mut self.observers);
        if let Some(platform) = self.by_index.get(index).and_then(|p| p.as_ref()) {
            for observer in observers.iter_mut() {
                observer.platform_added(sim_time, platform);
            }
        }
        self.observers.append(&mut observers);
    }

    fn notify_platform_initialized(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let mut observers = std::mem::take(&mut self.observers);
        if let Some(platform) = self.by_index.get(index).and_then(|p| p.as_ref()) {
            for observer in observers.iter_mut() {
                observer.platform_initialized(sim_time, platform);
            }
        }
        self.observers.append(&mut observers);
    }

    fn notify_platform_broken(&mut self, sim_time: SimTime, index: PlatformIndex) {
        let mut observers = std::mem::take(&mut self.observers);
        if let Some(platform) = self.by_index.get(index).and_then(|p| p.as_ref()) {
            for observer in observers.iter_mut() {
                observer.platform_broken(sim_time, platform);
            }
        }
        self.observers.append(&mut observers);
    }

    fn notify_platform_deleted(&mut self, sim_time: SimTime, platform: &Platform) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.platform_deleted(sim_time, platform);
        }
        self.observers.append(&mut observers);
    }

    fn notify_part_status(
        &mut self,
        sim_time: SimTime,
        index: PlatformIndex,
        part_name: &str,
        turned_on: bool,
    ) {
        let mut observers = std::mem::take(&mut self.observers);
        if let Some(platform) = self.by_index.get(index).and_then(|p| p.as_ref()) {
            for observer in observers.iter_mut() {
                if turned_on {
                    observer.part_turned_on(sim_time, platform, part_name);
                } else {
                    observer.part_turned_off(sim_time, platform, part_name);
                }
            }
        }
        self.observers.append(&mut observers);
    }

    fn notify_simulation_complete(&mut self, sim_time: SimTime, reason: CompletionReason) {
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.simulation_complete(sim_time, reason);
        }
        self.observers.append(&mut observers);
    }
}

#[derive(Clone, Copy)]
enum InitPhase {
    One,
    Two,
}

impl InitPhase {
    fn label(self) -> &'static str {
        match self {
            Self::One => "phase one",
            Self::Two => "phase two",
        }
    }
}

// ── Internal events ────────────────────────────────────────────

/// Introduces a platform at a future time.
struct AddPlatformEvent {
    time: SimTime,
    platform: Option<Platform>,
}

impl Event for AddPlatformEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition {
        if let Some(platform) = self.platform.take() {
            let name = platform.name().to_string();
            if let Err(err) = sim.add_platform(platform) {
                log::warn!("deferred platform '{name}' could not be added: {err}");
            }
        }
        EventDisposition::Delete
    }
}

/// Physically removes a platform scheduled for deletion.
struct RemovePlatformEvent {
    time: SimTime,
    index: PlatformIndex,
}

impl Event for RemovePlatformEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition {
        sim.process_remove_platform(self.time, self.index);
        EventDisposition::Delete
    }
}

/// Periodic part update, guarded by the part's update epoch. A stale
/// epoch means the part was turned off or re-intervaled since this
/// event was scheduled; the event then deletes itself.
struct PartUpdateEvent {
    time: SimTime,
    platform_index: PlatformIndex,
    part_name: String,
    epoch: u64,
}

impl Event for PartUpdateEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition {
        let Some(platform) = sim.platform_by_index_mut(self.platform_index) else {
            return EventDisposition::Delete;
        };
        let Some(part) = platform.components_mut().part_by_name_mut(&self.part_name) else {
            return EventDisposition::Delete;
        };
        if !part.part().is_turned_on() || part.part().update_epoch() != self.epoch {
            return EventDisposition::Delete;
        }
        part.update(self.time);
        let interval = part.part().update_interval();
        if interval <= 0.0 {
            return EventDisposition::Delete;
        }
        self.time += interval;
        EventDisposition::Reschedule(self.time)
    }
}

/// Returns a damaged, restorable part to operational.
struct PartRestorationEvent {
    time: SimTime,
    platform_index: PlatformIndex,
    part_name: String,
}

impl Event for PartRestorationEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition {
        if let Some(platform) = sim.platform_by_index_mut(self.platform_index) {
            if let Some(part) = platform.components_mut().part_by_name_mut(&self.part_name) {
                part.restore(self.time);
            }
        }
        EventDisposition::Delete
    }
}
