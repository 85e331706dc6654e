//! Echolia Orchestrator -- the per-request inference pipeline.
//!
//! Sits between the HTTP layer and the three collaborator crates
//! (`echolia-crypto`, `echolia-llm`, `echolia-quota`): checks the caller's
//! daily quota, looks up the requested task, rotates the server's identity
//! key if it has gone stale, decrypts the sealed request, dispatches it to
//! the model provider, validates the shape of what comes back, and seals
//! the reply. Every secret buffer touched along the way is wiped on every
//! exit path, success or failure.

pub mod error;
pub mod orchestrator;

pub use error::{GatewayError, GatewayResult};
pub use orchestrator::{ExecuteRequest, InferenceOrchestrator, SealedReply};
