//! SQLite persistence layer — the run ledger and event log.
//!
//! RULE: Only store.rs talks to the database. Everything else records
//! through the EventRecorder observer or calls store methods — nothing
//! executes SQL directly.
//!
//! The event log is the determinism surface: two runs with the same
//! seed must append byte-identical payload sequences.

use crate::{
    error::SimResult,
    observer::SimulationObserver,
    platform::Platform,
    simulation::{CompletionReason, SimState},
    types::{RunId, SimTime},
};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

/// Every occurrence worth persisting from a run.
/// Variants are added over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    RunInitialized { run_id: RunId, seed: u64 },
    StateChanged { state: String },
    PlatformAdded { time: SimTime, name: String, platform_type: String, index: usize },
    PlatformInitialized { time: SimTime, name: String },
    PlatformDeleted { time: SimTime, name: String, index: usize },
    PlatformBroken { time: SimTime, name: String },
    PartTurnedOn { time: SimTime, platform: String, part: String },
    PartTurnedOff { time: SimTime, platform: String, part: String },
    ClockRateChanged { rate: f64 },
    SimulationComplete { time: SimTime, reason: String },
}

/// Extract a stable string name from a LogEvent variant.
/// Used for the event_type column in event_log.
pub fn event_type_name(event: &LogEvent) -> &'static str {
    match event {
        LogEvent::RunInitialized { .. } => "run_initialized",
        LogEvent::StateChanged { .. } => "state_changed",
        LogEvent::PlatformAdded { .. } => "platform_added",
        LogEvent::PlatformInitialized { .. } => "platform_initialized",
        LogEvent::PlatformDeleted { .. } => "platform_deleted",
        LogEvent::PlatformBroken { .. } => "platform_broken",
        LogEvent::PartTurnedOn { .. } => "part_turned_on",
        LogEvent::PartTurnedOff { .. } => "part_turned_off",
        LogEvent::ClockRateChanged { .. } => "clock_rate_changed",
        LogEvent::SimulationComplete { .. } => "simulation_complete",
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub sim_time: SimTime,
    pub source: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized LogEvent
}

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the simulation database at `path`. URI paths
    /// (`file:...?mode=memory&cache=shared`) are accepted so several
    /// connections can share one in-memory database.
    pub fn open(path: &str) -> SimResult<Self> {
        let flags = OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags)?;
        // WAL only applies to on-disk databases.
        if !path.starts_with("file:") {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str) -> SimResult<()> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, version, started_at],
        )?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, sim_time, source, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.sim_time,
                entry.source,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    /// All entries for a run, in append order.
    pub fn events_for_run(&self, run_id: &str) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, sim_time, source, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    sim_time: row.get(2)?,
                    source: row.get(3)?,
                    event_type: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str) -> SimResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn events_of_type(&self, run_id: &str, event_type: &str) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, sim_time, source, event_type, payload
             FROM event_log WHERE run_id = ?1 AND event_type = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, event_type], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    sim_time: row.get(2)?,
                    source: row.get(3)?,
                    event_type: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Observer that appends every lifecycle notification to the store.
pub struct EventRecorder {
    store: SimStore,
    run_id: RunId,
}

impl EventRecorder {
    pub fn new(store: SimStore, run_id: RunId) -> Self {
        Self { store, run_id }
    }

    /// Record the run header so seed differences are observable in the
    /// log itself.
    pub fn record_run_initialized(&self, seed: u64) {
        self.append(
            0.0,
            LogEvent::RunInitialized {
                run_id: self.run_id.clone(),
                seed,
            },
        );
    }

    fn append(&self, sim_time: SimTime, event: LogEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("failed to serialize log event: {err}");
                return;
            }
        };
        let entry = EventLogEntry {
            id: None,
            run_id: self.run_id.clone(),
            sim_time,
            source: "simulation".to_string(),
            event_type: event_type_name(&event).to_string(),
            payload,
        };
        if let Err(err) = self.store.append_event(&entry) {
            log::error!("failed to append event log entry: {err}");
        }
    }
}

impl SimulationObserver for EventRecorder {
    fn state_changed(&mut self, state: SimState) {
        self.append(0.0, LogEvent::StateChanged { state: state.as_str().to_string() });
    }

    fn platform_added(&mut self, sim_time: SimTime, platform: &Platform) {
        self.append(
            sim_time,
            LogEvent::PlatformAdded {
                time: sim_time,
                name: platform.name().to_string(),
                platform_type: platform.type_name().to_string(),
                index: platform.index(),
            },
        );
    }

    fn platform_initialized(&mut self, sim_time: SimTime, platform: &Platform) {
        self.append(
            sim_time,
            LogEvent::PlatformInitialized { time: sim_time, name: platform.name().to_string() },
        );
    }

    fn platform_deleted(&mut self, sim_time: SimTime, platform: &Platform) {
        self.append(
            sim_time,
            LogEvent::PlatformDeleted {
                time: sim_time,
                name: platform.name().to_string(),
                index: platform.index(),
            },
        );
    }

    fn platform_broken(&mut self, sim_time: SimTime, platform: &Platform) {
        self.append(
            sim_time,
            LogEvent::PlatformBroken { time: sim_time, name: platform.name().to_string() },
        );
    }

    fn part_turned_on(&mut self, sim_time: SimTime, platform: &Platform, part_name: &str) {
        self.append(
            sim_time,
            LogEvent::PartTurnedOn {
                time: sim_time,
                platform: platform.name().to_string(),
                part: part_name.to_string(),
            },
        );
    }

    fn part_turned_off(&mut self, sim_time: SimTime, platform: &Platform, part_name: &str) {
        self.append(
            sim_time,
            LogEvent::PartTurnedOff {
                time: sim_time,
                platform: platform.name().to_string(),
                part: part_name.to_string(),
            },
        );
    }

    fn clock_rate_changed(&mut self, rate: f64) {
        self.append(0.0, LogEvent::ClockRateChanged { rate });
    }

    fn simulation_complete(&mut self, sim_time: SimTime, reason: CompletionReason) {
        self.append(
            sim_time,
            LogEvent::SimulationComplete { time: sim_time, reason: reason.as_str().to_string() },
        );
    }
}
