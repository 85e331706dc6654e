//! Echolia Auth -- principal resolution and entitlement lookup.
//!
//! One collaborator seam, two traits: [`PrincipalResolver`] turns a bearer
//! token into `(principal_id, device_id)`; [`EntitlementResolver`] answers
//! what tier that principal is on. [`JwtPrincipalResolver`] is the only
//! concrete implementation this crate ships, backed by a single configured
//! issuer/audience/secret -- everything else (login, password hashing, 2FA,
//! sessions, API key signing) belongs to the identity system that issues
//! the tokens, not to this gateway.

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod types;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use jwt::JwtPrincipalResolver;
pub use middleware::{AuthenticatedPrincipal, PrincipalResolverHandle};
pub use types::{EntitlementResolver, PrincipalResolver, TokenClaims};
