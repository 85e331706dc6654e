//! `POST /api/v1/execute`

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine};
use echolia_auth::AuthenticatedPrincipal;
use echolia_orchestrator::{ExecuteRequest, GatewayError};
use validator::Validate;

use crate::dto::{ExecuteRequestDto, ExecuteResponseDto, UsageDto};
use crate::error::ApiError;
use crate::state::AppState;

/// Runs one sealed inference task end to end: quota check, decrypt,
/// dispatch to the model provider, validate, reseal.
///
/// Parsed manually from raw bytes rather than through axum's `Json`
/// extractor (and `validator`'s own `ValidatedJson`) so that a malformed
/// body and a malformed base64 field both surface through the same
/// `ApiError` error envelope; field-level validation still runs via
/// `ExecuteRequestDto::validate` right after deserialization. The task
/// tag itself is handed to the orchestrator unparsed -- it resolves the
/// tag only after the quota reservation, so an unrecognized task still
/// consumes one unit of quota.
#[utoipa::path(
    post,
    path = "/api/v1/execute",
    tag = "Execute",
    request_body = ExecuteRequestDto,
    responses(
        (status = 200, description = "Task result, sealed", body = ExecuteResponseDto),
        (status = 429, description = "Daily quota exceeded"),
    )
)]
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    body: Bytes,
) -> Result<Json<ExecuteResponseDto>, ApiError> {
    let request: ExecuteRequestDto =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    request
        .validate()
        .map_err(|e| ApiError::MalformedBody(e.to_string()))?;

    let tier = state.entitlement_resolver.tier_of(&principal).await?;

    let ciphertext = decode_field(&request.encrypted_content)?;
    let nonce = decode_field(&request.nonce)?;
    let tag = decode_field(&request.mac)?;
    let ephemeral_public = decode_field(&request.ephemeral_public_key)?;

    let (reply, usage) = state
        .orchestrator
        .execute(
            &principal,
            tier,
            &request.task,
            ExecuteRequest {
                ciphertext,
                nonce,
                tag,
                ephemeral_public,
            },
        )
        .await
        .map_err(ApiError::Gateway)?;

    Ok(Json(ExecuteResponseDto {
        encrypted_result: STANDARD.encode(reply.ciphertext),
        nonce: STANDARD.encode(reply.nonce),
        mac: STANDARD.encode(reply.tag),
        usage: UsageDto::from(&usage),
    }))
}

fn decode_field(value: &str) -> Result<Vec<u8>, ApiError> {
    STANDARD.decode(value).map_err(|e| {
        tracing::debug!(error = %e, "rejected a malformed base64 field");
        ApiError::Gateway(GatewayError::MalformedEnvelope)
    })
}
