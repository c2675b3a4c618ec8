//! Component role identifiers.
//!
//! RULE: A role identifies a capability concept, not a concrete type.
//! Roles are assigned at compile time through the ComponentRole trait;
//! asking for the role of a type without an impl is a build error, so a
//! missing registration can never reach a running simulation.

use serde::{Deserialize, Serialize};

/// A small positive integer naming a component capability.
///
/// Reserved ranges partition the role space:
///   1..=999      core framework roles
///   1000..=9999  extension roles
///   10000..      site-local roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role(pub i32);

impl Role {
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }

    pub fn is_core(self) -> bool {
        (1..=999).contains(&self.0)
    }

    pub fn is_extension(self) -> bool {
        (1000..=9999).contains(&self.0)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Core framework roles ───────────────────────────────────────────
pub const ROLE_PLATFORM: Role = Role(1);
pub const ROLE_PLATFORM_PART: Role = Role(2);

/// First role value available to extensions.
pub const ROLE_EXTENSION_BASE: Role = Role(1000);
/// First role value available to site-local components.
pub const ROLE_SITE_BASE: Role = Role(10000);

// ── Initialization order bands ─────────────────────────────────────
//
// Initialization order is assigned independently of role identity and
// sequences only the initialization fan-out. 0 means input order.
// Strongly negative values run first (command chains, track managers,
// movers), strongly positive values run last (zones).
pub const INIT_ORDER_FIRST: i64 = -1_000_000;
pub const INIT_ORDER_EARLY: i64 = -1_000;
pub const INIT_ORDER_DEFAULT: i64 = 0;
pub const INIT_ORDER_LATE: i64 = 1_000_000;

/// Compile-time binding of a component type to its role and its
/// initialization order.
///
/// Every concrete component type that participates in role-typed lookup
/// must implement this trait. `find_by_role::<T>()` is only callable for
/// registered types; there is no runtime fallback path.
pub trait ComponentRole {
    /// The primary role this type is registered under. Must be > 0.
    const ROLE: Role;

    /// Initialization sequencing for this type. Defaults to input order.
    const INIT_ORDER: i64 = INIT_ORDER_DEFAULT;
}
