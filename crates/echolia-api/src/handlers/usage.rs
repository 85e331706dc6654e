//! `GET /api/v1/usage`

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use echolia_auth::AuthenticatedPrincipal;

use crate::dto::UsageDto;
use crate::error::ApiError;
use crate::state::AppState;

/// Read-only usage snapshot. Unlike `/execute`, this never reserves a
/// request against the caller's daily ceiling.
#[utoipa::path(
    get,
    path = "/api/v1/usage",
    tag = "Usage",
    responses((status = 200, description = "Current quota usage", body = UsageDto))
)]
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
) -> Result<Json<UsageDto>, ApiError> {
    let tier = state.entitlement_resolver.tier_of(&principal).await?;
    let snapshot = state.quota.peek(principal.quota_key(), tier).await.map_err(|e| {
        tracing::error!(error = %e, "quota peek failed");
        ApiError::Gateway(echolia_orchestrator::GatewayError::Server)
    })?;

    Ok(Json(UsageDto::from(&snapshot)))
}
