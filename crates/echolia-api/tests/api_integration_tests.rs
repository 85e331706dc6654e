//! API Integration Tests
//!
//! Exercises the router end to end with an in-process `AppState`. The
//! quota ledger's Postgres pool is lazy (never connects), so only the
//! paths that don't reach the database are covered here; a live pool is
//! required for `/execute` and `/usage` happy-path coverage.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use echolia_api::{create_router, AppState};
use echolia_auth::{AuthConfig, JwtPrincipalResolver};
use echolia_crypto::KeyStore;
use echolia_llm::{ProviderGateway, ProviderKind};
use echolia_orchestrator::InferenceOrchestrator;
use echolia_quota::{QuotaConfig, QuotaLedger};
use tower::ServiceExt;

fn test_router() -> Router {
    let dir = tempfile::tempdir().unwrap();
    let keystore = Arc::new(
        KeyStore::initialize(&dir.path().join("identity.bin"), Duration::from_secs(3600)).unwrap(),
    );
    std::mem::forget(dir);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/does-not-need-to-exist-for-this-test")
        .unwrap();
    let quota = Arc::new(QuotaLedger::new(
        pool,
        QuotaConfig {
            free_daily_limit: 10,
            elevated_daily_limit: 100,
        },
    ));

    let auth_config = AuthConfig {
        jwt_secret: "test-secret-key-at-least-32-bytes-long!!".to_string(),
        issuer: "echolia".to_string(),
        audience: "echolia-gateway".to_string(),
    };
    let resolver = Arc::new(JwtPrincipalResolver::new(&auth_config));

    let provider_gateway =
        Arc::new(ProviderGateway::initialize(&[ProviderKind::Deterministic]).unwrap());
    let orchestrator = Arc::new(InferenceOrchestrator::new(
        keystore.clone(),
        quota.clone(),
        provider_gateway,
    ));

    let state = Arc::new(AppState::new(
        keystore,
        quota,
        resolver.clone(),
        resolver,
        orchestrator,
    ));

    create_router(state)
}

async fn get(router: &Router, uri: &str) -> StatusCode {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn ping_requires_no_authentication() {
    let router = test_router();
    assert_eq!(get(&router, "/api/v1/ping").await, StatusCode::OK);
}

#[tokio::test]
async fn public_key_rejects_a_missing_bearer_token() {
    let router = test_router();
    assert_eq!(get(&router, "/api/v1/public-key").await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn usage_rejects_a_missing_bearer_token() {
    let router = test_router();
    assert_eq!(get(&router, "/api/v1/usage").await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn execute_rejects_a_missing_bearer_token() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/execute")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn swagger_ui_is_mounted() {
    let router = test_router();
    let status = get(&router, "/swagger-ui").await;
    assert!(status == StatusCode::OK || status == StatusCode::PERMANENT_REDIRECT);
}
