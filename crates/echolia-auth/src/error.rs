//! Principal resolution error types.
//!
//! Kept deliberately narrow: this crate answers one question ("who is
//! making this request, and what can they do"), so its error surface is
//! the handful of ways a bearer token can fail to answer that.

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header, or not a `Bearer` scheme.
    #[error("authentication required")]
    Unauthenticated,

    /// Signature, issuer, audience, `exp`/`nbf` failed `jsonwebtoken` validation.
    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    TokenExpired,

    /// Token validated but is missing a claim this resolver requires
    /// (`sub`, `device_id`, or `tier`).
    #[error("token is missing required claim: {0}")]
    MissingClaim(&'static str),

    /// `tier` claim present but not one of the recognized values.
    #[error("unrecognized tier claim: {0}")]
    UnknownTier(String),
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::MissingClaim(_)
            | Self::UnknownTier(_) => 401,
        }
    }

    /// Every variant here is an authentication failure from the caller's
    /// point of view, so every variant wears the same wire tag -- the
    /// distinction between "no header" and "expired token" is logged
    /// server-side (via `Display`) but never exposed to the client.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::MissingClaim(_)
            | Self::UnknownTier(_) => "auth_required",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_all_401() {
        assert_eq!(AuthError::Unauthenticated.status_code(), 401);
        assert_eq!(AuthError::InvalidToken.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::MissingClaim("sub").status_code(), 401);
        assert_eq!(AuthError::UnknownTier("gold".into()).status_code(), 401);
    }

    #[test]
    fn every_variant_reports_the_canonical_auth_required_tag() {
        assert_eq!(AuthError::Unauthenticated.error_code(), "auth_required");
        assert_eq!(AuthError::InvalidToken.error_code(), "auth_required");
        assert_eq!(AuthError::TokenExpired.error_code(), "auth_required");
        assert_eq!(AuthError::MissingClaim("sub").error_code(), "auth_required");
        assert_eq!(AuthError::UnknownTier("gold".into()).error_code(), "auth_required");
    }
}
