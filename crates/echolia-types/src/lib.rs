//! Echolia Types - canonical shared types for the E2EE inference gateway
//!
//! Zero dependencies on other echolia crates. Defines the handful of
//! cross-cutting value types every other crate needs: the authenticated
//! principal, the entitlement tier, and the task tag.

pub mod principal;
pub mod task;

pub use principal::{Principal, Tier};
pub use task::{TaskTag, UnknownTask};

/// Version of the echolia types schema
pub const TYPES_VERSION: &str = "0.1.0";
