//! `GET /api/v1/public-key`

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine};
use echolia_auth::AuthenticatedPrincipal;
use echolia_orchestrator::GatewayError;

use crate::dto::PublicKeyResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Returns the server's current public identity. Authenticated but
/// otherwise static -- the client caches it until `expires_at`.
///
/// Rotates first: this is the only endpoint a polling-only client ever
/// hits, so without its own `rotate_if_stale` call here it could serve a
/// key past `expires_at` forever.
#[utoipa::path(
    get,
    path = "/api/v1/public-key",
    tag = "Keys",
    responses((status = 200, description = "Current server identity", body = PublicKeyResponse))
)]
pub async fn get_public_key(
    State(state): State<Arc<AppState>>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    if let Err(e) = state.keystore.rotate_if_stale() {
        tracing::error!(error = %e, "key rotation failed");
        return Err(ApiError::Gateway(GatewayError::Server));
    }
    let view = state.keystore.current_public_view();

    Ok(Json(PublicKeyResponse {
        public_key: STANDARD.encode(view.public_key),
        key_id: view.key_id,
        expires_at: view.expires_at,
        algorithm: "X25519".to_string(),
    }))
}
