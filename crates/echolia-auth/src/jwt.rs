//! Bearer-JWT implementation of `PrincipalResolver` and `EntitlementResolver`.
//!
//! Verification only -- this crate never mints tokens. An upstream identity
//! system is assumed to issue them with the claims in [`TokenClaims`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use echolia_types::{Principal, Tier};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::{EntitlementResolver, PrincipalResolver, TokenClaims};

/// Verifies bearer tokens against a single configured issuer/audience/secret.
///
/// `resolve` and `tier_of` are two separate collaborator seams (per the
/// entitlement source being, in principle, a different service than
/// identity). Since both happen to be backed by the same JWT here, `resolve`
/// stashes the tier it just verified so `tier_of` can answer without the
/// raw token -- a cached-claims map, mirroring the shape of a revoked-token
/// cache keyed by subject.
pub struct JwtPrincipalResolver {
    decoding_key: DecodingKey,
    validation: Validation,
    resolved_tiers: Arc<RwLock<HashMap<String, Tier>>>,
}

impl JwtPrincipalResolver {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
            resolved_tiers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    fn tier_from_claim(claim: &str) -> AuthResult<Tier> {
        match claim {
            "free" => Ok(Tier::Free),
            "elevated" => Ok(Tier::Elevated),
            other => Err(AuthError::UnknownTier(other.to_string())),
        }
    }
}

#[async_trait]
impl PrincipalResolver for JwtPrincipalResolver {
    async fn resolve(&self, bearer_token: &str) -> AuthResult<Principal> {
        let claims = self.decode(bearer_token)?;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingClaim("sub"));
        }
        if claims.device_id.is_empty() {
            return Err(AuthError::MissingClaim("device_id"));
        }
        let tier = Self::tier_from_claim(&claims.tier)?;

        let principal = Principal::new(claims.sub, claims.device_id);
        self.resolved_tiers
            .write()
            .await
            .insert(principal.principal_id.clone(), tier);
        Ok(principal)
    }
}

#[async_trait]
impl EntitlementResolver for JwtPrincipalResolver {
    async fn tier_of(&self, principal: &Principal) -> AuthResult<Tier> {
        self.resolved_tiers
            .read()
            .await
            .get(&principal.principal_id)
            .copied()
            .ok_or(AuthError::MissingClaim("tier"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-at-least-32-bytes-long!".to_string(),
            issuer: "echolia-test".to_string(),
            audience: "echolia-gateway-test".to_string(),
        }
    }

    fn sign(config: &AuthConfig, claims: &TokenClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims(config: &AuthConfig) -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        TokenClaims {
            sub: "user-1".to_string(),
            device_id: "device-a".to_string(),
            tier: "elevated".to_string(),
            iat: now,
            exp: now + 900,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
        }
    }

    #[tokio::test]
    async fn resolves_principal_from_a_valid_token() {
        let config = test_config();
        let token = sign(&config, &valid_claims(&config));
        let resolver = JwtPrincipalResolver::new(&config);

        let principal = resolver.resolve(&token).await.unwrap();
        assert_eq!(principal.principal_id, "user-1");
        assert_eq!(principal.device_id, "device-a");
    }

    #[tokio::test]
    async fn tier_of_answers_from_the_tier_resolve_just_verified() {
        let config = test_config();
        let token = sign(&config, &valid_claims(&config));
        let resolver = JwtPrincipalResolver::new(&config);

        let principal = resolver.resolve(&token).await.unwrap();
        let tier = resolver.tier_of(&principal).await.unwrap();
        assert_eq!(tier, Tier::Elevated);
    }

    #[tokio::test]
    async fn tier_of_fails_for_a_principal_never_resolved() {
        let config = test_config();
        let resolver = JwtPrincipalResolver::new(&config);
        let stranger = Principal::new("never-seen", "device-x");

        let err = resolver.tier_of(&stranger).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingClaim("tier")));
    }

    #[tokio::test]
    async fn rejects_an_unrecognized_tier_claim() {
        let config = test_config();
        let mut claims = valid_claims(&config);
        claims.tier = "gold".to_string();
        let token = sign(&config, &claims);
        let resolver = JwtPrincipalResolver::new(&config);

        let err = resolver.resolve(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownTier(t) if t == "gold"));
    }

    #[tokio::test]
    async fn rejects_an_expired_token() {
        let config = test_config();
        let mut claims = valid_claims(&config);
        claims.iat -= 1000;
        claims.exp -= 1000;
        let token = sign(&config, &claims);
        let resolver = JwtPrincipalResolver::new(&config);

        let err = resolver.resolve(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn rejects_a_token_signed_with_a_different_secret() {
        let config = test_config();
        let other_config = AuthConfig {
            jwt_secret: "a-completely-different-secret-value!!".to_string(),
            ..test_config()
        };
        let token = sign(&other_config, &valid_claims(&config));
        let resolver = JwtPrincipalResolver::new(&config);

        assert!(resolver.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_a_token_for_the_wrong_audience() {
        let config = test_config();
        let mut claims = valid_claims(&config);
        claims.aud = "some-other-service".to_string();
        let token = sign(&config, &claims);
        let resolver = JwtPrincipalResolver::new(&config);

        assert!(resolver.resolve(&token).await.is_err());
    }
}
