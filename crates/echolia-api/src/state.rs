//! Application state shared across handlers.
//!
//! Holds the server's key material, the quota ledger, the principal
//! resolver, and the orchestrator that ties them together for a request.

use std::sync::Arc;

use axum::extract::FromRef;
use echolia_auth::{EntitlementResolver, PrincipalResolver, PrincipalResolverHandle};
use echolia_crypto::KeyStore;
use echolia_orchestrator::InferenceOrchestrator;
use echolia_quota::QuotaLedger;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub keystore: Arc<KeyStore>,
    pub quota: Arc<QuotaLedger>,
    pub principal_resolver: Arc<dyn PrincipalResolver>,
    pub entitlement_resolver: Arc<dyn EntitlementResolver>,
    pub orchestrator: Arc<InferenceOrchestrator>,
}

impl AppState {
    pub fn new(
        keystore: Arc<KeyStore>,
        quota: Arc<QuotaLedger>,
        principal_resolver: Arc<dyn PrincipalResolver>,
        entitlement_resolver: Arc<dyn EntitlementResolver>,
        orchestrator: Arc<InferenceOrchestrator>,
    ) -> Self {
        Self {
            keystore,
            quota,
            principal_resolver,
            entitlement_resolver,
            orchestrator,
        }
    }
}

// The router is built over `Arc<AppState>` (see `routes.rs`), so the
// extractor lookup axum performs is keyed on that wrapper type, not on
// `AppState` directly.
impl FromRef<Arc<AppState>> for PrincipalResolverHandle {
    fn from_ref(state: &Arc<AppState>) -> Self {
        PrincipalResolverHandle(state.principal_resolver.clone())
    }
}
