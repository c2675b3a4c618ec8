//! Shared primitive types used across the entire simulation.

/// Simulation time in seconds from run start.
pub type SimTime = f64;

/// The unique index of a platform within one simulation run.
/// Index 0 is reserved and means "no platform". Indices are never
/// reassigned, even after the platform is deleted.
pub type PlatformIndex = usize;

/// The canonical run identifier.
pub type RunId = String;
