//! Claims shape and the two collaborator traits this crate exists to implement.

use async_trait::async_trait;
use echolia_types::{Principal, Tier};
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;

/// JWT claims this resolver requires. Anything else on the token is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the principal id.
    pub sub: String,
    pub device_id: String,
    pub tier: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Turns a bearer token into the identity of the caller.
///
/// Resolution failure must short-circuit before any quota consumption or
/// task dispatch happens -- callers enforce that ordering, not this trait.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, bearer_token: &str) -> AuthResult<Principal>;
}

/// Looks up what a principal is entitled to. Split from `PrincipalResolver`
/// because in a full deployment this can be backed by a separate service;
/// here both are answered from the same verified token.
#[async_trait]
pub trait EntitlementResolver: Send + Sync {
    async fn tier_of(&self, principal: &Principal) -> AuthResult<Tier>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_round_trip_through_json() {
        let claims = TokenClaims {
            sub: "user-1".to_string(),
            device_id: "device-a".to_string(),
            tier: "elevated".to_string(),
            iat: 0,
            exp: 100,
            iss: "echolia".to_string(),
            aud: "echolia-gateway".to_string(),
        };
        let json = serde_json::to_string(&claims).unwrap();
        let back: TokenClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sub, "user-1");
        assert_eq!(back.tier, "elevated");
    }
}
