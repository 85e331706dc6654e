//! Wire-format request/response bodies. Translates between the domain
//! types (`Principal`, `UsageSnapshot`, `TaskTag`) and the base64-heavy
//! JSON shapes the client speaks.

use chrono::{DateTime, Utc};
use echolia_quota::UsageSnapshot;
use echolia_types::Tier;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// `GET /api/v1/public-key` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicKeyResponse {
    /// Base64-encoded X25519 public point.
    pub public_key: String,
    pub key_id: String,
    pub expires_at: DateTime<Utc>,
    pub algorithm: String,
}

/// `POST /api/v1/execute` request body. Every binary field is base64.
///
/// `Validate` only rejects what field presence/shape alone can catch (an
/// empty task name, an empty field that should carry base64 data); actual
/// base64 decoding and envelope-length checks still happen downstream in
/// the handler and `SealedEnvelope::from_parts`.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ExecuteRequestDto {
    #[validate(length(min = 1, message = "task must not be empty"))]
    pub task: String,
    #[validate(length(min = 1, message = "encrypted_content must not be empty"))]
    pub encrypted_content: String,
    #[validate(length(min = 1, message = "nonce must not be empty"))]
    pub nonce: String,
    #[validate(length(min = 1, message = "mac must not be empty"))]
    pub mac: String,
    #[validate(length(min = 1, message = "ephemeral_public_key must not be empty"))]
    pub ephemeral_public_key: String,
    #[validate(length(min = 1, message = "client_version must not be empty"))]
    pub client_version: String,
}

/// `POST /api/v1/execute` success response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExecuteResponseDto {
    pub encrypted_result: String,
    pub nonce: String,
    pub mac: String,
    pub usage: UsageDto,
}

/// Shared shape between the execute response and `/api/v1/usage`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UsageDto {
    pub requests_remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub tier: String,
}

impl From<&UsageSnapshot> for UsageDto {
    fn from(snapshot: &UsageSnapshot) -> Self {
        Self {
            requests_remaining: snapshot.remaining,
            reset_at: snapshot.reset_at,
            tier: tier_tag(snapshot.tier).to_string(),
        }
    }
}

fn tier_tag(tier: Tier) -> &'static str {
    match tier {
        Tier::Free => "free",
        Tier::Elevated => "elevated",
    }
}

/// Body returned alongside `quota_exceeded`: the caller gets the usage it
/// would otherwise have had to make a second request to fetch.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn usage_dto_carries_the_static_tier_tag() {
        let snapshot = UsageSnapshot {
            remaining: 3,
            reset_at: Utc::now(),
            tier: Tier::Elevated,
        };
        let dto = UsageDto::from(&snapshot);
        assert_eq!(dto.tier, "elevated");
        assert_eq!(dto.requests_remaining, 3);
    }

    fn sample_request() -> ExecuteRequestDto {
        ExecuteRequestDto {
            task: "tagging".to_string(),
            encrypted_content: "x".to_string(),
            nonce: "x".to_string(),
            mac: "x".to_string(),
            ephemeral_public_key: "x".to_string(),
            client_version: "1.0.0".to_string(),
        }
    }

    #[test]
    fn a_fully_populated_execute_request_validates() {
        assert!(sample_request().validate().is_ok());
    }

    #[test]
    fn an_empty_task_fails_validation() {
        let mut request = sample_request();
        request.task = String::new();
        assert!(request.validate().is_err());
    }
}
