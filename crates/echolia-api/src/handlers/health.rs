//! Liveness probe. No auth, no dependency checks -- Prometheus scraping
//! and the quota/identity health checks live on the `/metrics` side port.

use axum::Json;

/// Ping endpoint
#[utoipa::path(
    get,
    path = "/api/v1/ping",
    tag = "General",
    responses((status = 200, description = "Pong"))
)]
pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}
