//! The authenticated actor behind a request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The entitlement tier controlling a principal's daily request ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Elevated,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Elevated => write!(f, "elevated"),
        }
    }
}

/// An authenticated user identifier plus the device that issued the request.
///
/// Produced by the identity collaborator (`echolia-auth::PrincipalResolver`)
/// from a bearer token. Never logged with anything derived from request
/// content — only for correlating which principal made which call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: String,
    pub device_id: String,
}

impl Principal {
    pub fn new(principal_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            device_id: device_id.into(),
        }
    }

    /// Stable key for quota/storage lookups: principal only, device-independent.
    pub fn quota_key(&self) -> &str {
        &self.principal_id
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.principal_id, self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_display() {
        assert_eq!(Tier::Free.to_string(), "free");
        assert_eq!(Tier::Elevated.to_string(), "elevated");
    }

    #[test]
    fn principal_display_does_not_panic_on_odd_ids() {
        let p = Principal::new("u1", "dev-A");
        assert_eq!(p.to_string(), "u1:dev-A");
        assert_eq!(p.quota_key(), "u1");
    }

    #[test]
    fn tier_serde_roundtrip() {
        let json = serde_json::to_string(&Tier::Elevated).unwrap();
        assert_eq!(json, "\"elevated\"");
        let back: Tier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Tier::Elevated);
    }
}
