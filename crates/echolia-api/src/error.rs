//! API error handling
//!
//! Wraps `GatewayError` (the orchestrator's ten terminal outcomes) plus a
//! couple of HTTP-layer-only failures that never reach the orchestrator:
//! a missing bearer header, or a request body that isn't valid JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use echolia_auth::AuthError;
use echolia_orchestrator::GatewayError;
use thiserror::Error;

use crate::dto::{ErrorBody, UsageDto};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Gateway(e) => e.status_code(),
            Self::Auth(e) => e.status_code(),
            Self::MalformedBody(_) => 400,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Gateway(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::MalformedBody(_) => "malformed_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let usage = match &self {
            Self::Gateway(GatewayError::RateLimited(snapshot)) => Some(UsageDto::from(snapshot)),
            _ => None,
        };

        if !matches!(self, Self::Gateway(GatewayError::RateLimited(_))) {
            tracing::warn!(error_code = self.error_code(), status = status.as_u16(), "request failed");
        }

        let body = ErrorBody {
            error: self.error_code().to_string(),
            usage,
        };

        (status, Json(body)).into_response()
    }
}
