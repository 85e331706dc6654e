//! `GatewayError`: the ten terminal outcomes of the inference pipeline.
//!
//! Each variant carries its own `status_code()`/`error_code()` pair,
//! matching the status-code/error-tag shape used across this workspace's
//! other error enums.

use echolia_quota::UsageSnapshot;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("unknown task")]
    BadTask,

    #[error("malformed envelope")]
    MalformedEnvelope,

    /// AEAD authentication/decode failure. Deliberately carries no detail:
    /// indistinguishable from the client's point of view whether the key
    /// was wrong or the ciphertext was corrupted.
    #[error("could not decrypt request")]
    Unprocessable,

    /// Carries the post-increment usage so the client can render a
    /// countdown; the increment that produced it is never rolled back.
    #[error("daily quota exceeded")]
    RateLimited(UsageSnapshot),

    #[error("provider unreachable")]
    ProviderTransport,

    #[error("provider rejected the request")]
    ProviderBadRequest,

    #[error("provider returned a server error")]
    ProviderServer,

    #[error("model output failed validation")]
    MalformedOutput,

    #[error("internal server error")]
    Server,
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::BadTask | Self::MalformedEnvelope => 400,
            Self::Unprocessable => 422,
            Self::RateLimited(_) => 429,
            Self::ProviderTransport | Self::ProviderBadRequest | Self::ProviderServer => 502,
            Self::MalformedOutput => 502,
            Self::Server => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "auth_required",
            Self::BadTask => "unknown_task",
            Self::MalformedEnvelope => "invalid_envelope",
            Self::Unprocessable => "decrypt_failed",
            Self::RateLimited(_) => "quota_exceeded",
            Self::ProviderTransport => "provider_unavailable",
            Self::ProviderBadRequest => "provider_rejected",
            Self::ProviderServer => "provider_error",
            Self::MalformedOutput => "model_output_invalid",
            Self::Server => "server_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use echolia_types::Tier;

    fn snapshot() -> UsageSnapshot {
        UsageSnapshot {
            remaining: 0,
            reset_at: Utc::now(),
            tier: Tier::Free,
        }
    }

    #[test]
    fn every_variant_has_exactly_one_status_and_tag() {
        let cases: Vec<(GatewayError, u16, &str)> = vec![
            (GatewayError::Unauthenticated, 401, "auth_required"),
            (GatewayError::BadTask, 400, "unknown_task"),
            (GatewayError::MalformedEnvelope, 400, "invalid_envelope"),
            (GatewayError::Unprocessable, 422, "decrypt_failed"),
            (GatewayError::RateLimited(snapshot()), 429, "quota_exceeded"),
            (GatewayError::ProviderTransport, 502, "provider_unavailable"),
            (GatewayError::ProviderBadRequest, 502, "provider_rejected"),
            (GatewayError::ProviderServer, 502, "provider_error"),
            (GatewayError::MalformedOutput, 502, "model_output_invalid"),
            (GatewayError::Server, 500, "server_error"),
        ];
        for (err, status, tag) in cases {
            assert_eq!(err.status_code(), status, "{tag}");
            assert_eq!(err.error_code(), tag);
        }
    }
}
