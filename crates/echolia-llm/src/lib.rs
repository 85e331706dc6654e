//! Echolia LLM - the task registry and provider gateway behind the
//! inference pipeline.
//!
//! This crate provides:
//! - `TaskRegistry`: the static table of supported analyses (prompts,
//!   output schemas, post-parse validation).
//! - `ProviderGateway`: a normalized facade over concrete LLM backends
//!   (Ollama, an OpenAI-compatible endpoint, OpenAI, Anthropic, or a
//!   deterministic stand-in), selected once at startup and immutable
//!   thereafter.
//!
//! Neither component ever logs message contents -- only metadata
//! (provider, model, token counts, finish reason).

pub mod gateway;
pub mod providers;
pub mod registry;

pub use gateway::{GatewayInitError, ProviderError, ProviderGateway, MAX_TOKENS, TEMPERATURE};
pub use providers::ProviderKind;
pub use registry::{MemoryItem, MemoryKind, RegistryError, TagItem, TaskDescriptor, TaskRegistry, TaskResult};
