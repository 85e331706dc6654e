//! `ProviderGateway`: picks a backend once at startup and dispatches
//! every subsequent request through it with fixed sampling parameters.

use std::sync::Arc;

use thiserror::Error;

use crate::providers::{
    AnthropicProvider, CompletionRequest, LLMError, LLMProvider, Message, OllamaProvider,
    OpenAICompatProvider, OpenAIProvider, ProviderKind, TokenUsage,
};

/// Sampling parameters are fixed for all core tasks; callers cannot adjust them.
pub const MAX_TOKENS: u32 = 1024;
pub const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Error)]
pub enum GatewayInitError {
    #[error("no LLM backend is configured in the preference list")]
    NoBackendConfigured,
}

/// The normalized error taxonomy every backend-specific failure collapses
/// into. The orchestrator maps each variant onto a single client-facing
/// category.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider rate limit")]
    Rate { retry_after_seconds: u64 },

    #[error("provider credential rejected")]
    Unauthorized,

    #[error("provider rejected the request: {0}")]
    BadRequest(String),

    #[error("provider server error: {0}")]
    Server(String),
}

impl ProviderError {
    fn from_llm_error(err: LLMError) -> Self {
        match err {
            LLMError::Network(msg) => Self::Transport(msg),
            LLMError::NotConfigured(msg) => Self::Transport(msg),
            LLMError::InvalidResponse(msg) => Self::Server(msg),
            LLMError::Http { status, message } => match status {
                401 | 403 => Self::Unauthorized,
                429 => Self::Rate { retry_after_seconds: 0 },
                400..=499 => Self::BadRequest(message),
                _ => Self::Server(message),
            },
        }
    }
}

/// Selects one backend at initialization and dispatches every request
/// through it for the lifetime of the process.
pub struct ProviderGateway {
    provider: Arc<dyn LLMProvider>,
    kind: ProviderKind,
}

impl ProviderGateway {
    /// Walks `preference` in order and keeps the first backend that
    /// reports itself configured. Fails if none are.
    pub fn initialize(preference: &[ProviderKind]) -> Result<Self, GatewayInitError> {
        for &kind in preference {
            let provider = construct(kind);
            if provider.is_configured() {
                let kind = provider.kind();
                tracing::info!(provider = %kind, "selected LLM provider backend");
                return Ok(Self { provider, kind });
            }
        }
        Err(GatewayInitError::NoBackendConfigured)
    }

    /// Reads `ECHOLIA_LLM_PROVIDERS` as a comma-separated ordered list
    /// (e.g. `anthropic,openai,ollama,deterministic`); defaults to a
    /// preference that always terminates in `deterministic` so a gateway
    /// can always be constructed for local development.
    pub fn from_env() -> Result<Self, GatewayInitError> {
        let _ = dotenvy::dotenv();
        Self::initialize(&preference_list_from_env())
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Dispatches one (system, user) pair through the selected backend
    /// with the fixed sampling parameters. Logs only metadata, never
    /// message contents.
    pub async fn dispatch(
        &self,
        system_message: String,
        user_message: String,
    ) -> Result<(String, TokenUsage), ProviderError> {
        let request = CompletionRequest::new(vec![Message::user(user_message)])
            .with_system(system_message)
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(ProviderError::from_llm_error)?;

        tracing::info!(
            provider = %self.kind,
            model = response.model.as_deref().unwrap_or("unknown"),
            input_tokens = response.usage.prompt_tokens,
            output_tokens = response.usage.completion_tokens,
            finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
            "provider dispatch completed"
        );

        Ok((response.content, response.usage))
    }
}

/// Always constructs the real provider for `kind`, even when it turns out
/// unconfigured -- `initialize`'s preference loop relies on the provider's
/// own `is_configured()` to decide whether to fall through, so this must
/// never substitute a different backend.
fn construct(kind: ProviderKind) -> Arc<dyn LLMProvider> {
    match kind {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_env()),
        ProviderKind::OpenAICompat => Arc::new(OpenAICompatProvider::from_env()),
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_env_or_unconfigured()),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_env_or_unconfigured()),
        ProviderKind::Deterministic => Arc::new(crate::providers::DeterministicProvider::new()),
    }
}

fn preference_list_from_env() -> Vec<ProviderKind> {
    match std::env::var("ECHOLIA_LLM_PROVIDERS") {
        Ok(raw) => raw
            .split(',')
            .filter_map(|s| ProviderKind::from_str(s.trim()))
            .collect(),
        Err(_) => vec![
            ProviderKind::Anthropic,
            ProviderKind::OpenAI,
            ProviderKind::OpenAICompat,
            ProviderKind::Ollama,
            ProviderKind::Deterministic,
        ],
    }
}
