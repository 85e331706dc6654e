//! Configuration for bearer-JWT principal resolution.

use serde::{Deserialize, Serialize};

/// Verification parameters for the single `JwtPrincipalResolver` this
/// crate ships. There is no token issuance here -- tokens are minted by
/// whatever upstream identity system the gateway is deployed behind;
/// this crate only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret used to verify the HMAC signature (HS256).
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            jwt_secret: std::env::var("ECHOLIA_JWT_SECRET")?,
            issuer: std::env::var("ECHOLIA_JWT_ISSUER")
                .unwrap_or_else(|_| "echolia".to_string()),
            audience: std::env::var("ECHOLIA_JWT_AUDIENCE")
                .unwrap_or_else(|_| "echolia-gateway".to_string()),
        })
    }

    /// Reject configs whose secret is too weak to trust for HS256.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.jwt_secret.is_empty() {
            errors.push("jwt_secret must be set".to_string());
        } else if self.jwt_secret.len() < 32 {
            errors.push("jwt_secret should be at least 256 bits (32 bytes)".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_secret() {
        let config = AuthConfig {
            jwt_secret: String::new(),
            issuer: "echolia".to_string(),
            audience: "echolia-gateway".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_a_sufficiently_long_secret() {
        let config = AuthConfig {
            jwt_secret: "a".repeat(32),
            issuer: "echolia".to_string(),
            audience: "echolia-gateway".to_string(),
        };
        assert!(config.validate().is_ok());
    }
}
