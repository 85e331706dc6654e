//! API Handlers
//!
//! Request handlers for all API endpoints. Each module handles one route.

pub mod execute;
pub mod health;
pub mod keys;
pub mod usage;
