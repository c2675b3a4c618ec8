use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot {operation} while simulation is {state}")]
    StateError { operation: &'static str, state: &'static str },

    #[error("Event scheduled in the past: event time {event_time}, sim time {sim_time}")]
    EventInPast { event_time: f64, sim_time: f64 },

    #[error("Duplicate component for unique role {role} on '{host}': '{component}'")]
    DuplicateRole { host: String, role: i32, component: String },

    #[error("Duplicate component name '{name}' on '{host}'")]
    DuplicateName { host: String, name: String },

    #[error("A platform named '{name}' already exists")]
    DuplicatePlatformName { name: String },

    #[error("Unknown {kind} type '{name}'")]
    UnknownType { kind: &'static str, name: String },

    #[error("Platform '{platform}' failed to initialize: component '{component}'")]
    PlatformInitialization { platform: String, component: String },

    #[error("Scenario load is not complete; call complete_load() first")]
    ScenarioIncomplete,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
