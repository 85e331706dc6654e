//! The `AuthenticatedPrincipal` extractor.
//!
//! An Axum `FromRequestParts` that fails the request before any handler
//! body runs, with no quota consumption on failure.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use echolia_types::Principal;
use serde::Serialize;
use std::sync::Arc;

use crate::error::AuthError;
use crate::types::PrincipalResolver;

/// Injected into Axum state so the extractor can reach the resolver.
#[derive(Clone)]
pub struct PrincipalResolverHandle(pub Arc<dyn PrincipalResolver>);

/// An authenticated caller, extracted from the `Authorization` header.
pub struct AuthenticatedPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
    PrincipalResolverHandle: axum::extract::FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = PrincipalResolverHandle::from_ref(state);
        let token = bearer_token(parts).map_err(auth_error_response)?;
        let principal = resolver
            .0
            .resolve(&token)
            .await
            .map_err(auth_error_response)?;
        Ok(AuthenticatedPrincipal(principal))
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AuthError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::Unauthenticated)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidToken)?;
    value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or(AuthError::Unauthenticated)
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

fn auth_error_response(error: AuthError) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
    let body = ErrorBody {
        code: error.error_code().to_string(),
        message: error.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn parts_with_auth_header(value: Option<&str>) -> Parts {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(
                axum::http::header::AUTHORIZATION,
                HeaderValue::from_str(v).unwrap(),
            );
        }
        parts.headers = headers;
        parts
    }

    #[test]
    fn extracts_the_token_from_a_bearer_header() {
        let parts = parts_with_auth_header(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_a_missing_header() {
        let parts = parts_with_auth_header(None);
        assert!(matches!(bearer_token(&parts), Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn rejects_a_non_bearer_scheme() {
        let parts = parts_with_auth_header(Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(bearer_token(&parts), Err(AuthError::Unauthenticated)));
    }
}
