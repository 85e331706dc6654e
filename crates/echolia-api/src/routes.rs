//! API Routes
//!
//! Route definitions for all API endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{security_headers_middleware, timing_middleware};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::health::ping))
        .route("/public-key", get(handlers::keys::get_public_key))
        .route("/execute", post(handlers::execute::execute_task))
        .route("/usage", get(handlers::usage::get_usage))
}

/// Create Swagger UI routes, served alongside the generated OpenAPI document.
pub fn swagger_routes() -> Router<Arc<AppState>> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Assembles the full router: versioned API, swagger UI, CORS, tracing,
/// timing, and security headers.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(swagger_routes())
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(timing_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    #[test]
    fn routes_compile() {
        assert!(true);
    }
}
