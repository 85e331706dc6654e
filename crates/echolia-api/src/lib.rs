//! Echolia API -- the HTTP surface of the E2EE inference gateway.
//!
//! Four routes under `/api/v1`: `public-key`, `execute`, `usage`, `ping`.
//! Everything else (decrypt, dispatch, reseal) lives one layer down in
//! `echolia-orchestrator`; this crate's job is request parsing, auth
//! extraction, response shaping, and OpenAPI documentation.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
