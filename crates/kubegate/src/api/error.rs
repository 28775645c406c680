//! Unified API error handling with structured responses.
//!
//! Upstream failure detail (token exchange, verification, claim names) is
//! logged server-side but never echoed to the browser.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::oidc::OidcError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing cluster parameter")]
    MissingCluster,

    #[error("unknown cluster {0:?}")]
    UnknownCluster(String),

    #[error("missing code parameter")]
    MissingCode,

    #[error("state did not match")]
    CsrfMismatch,

    #[error("authentication provider error: {0}")]
    Provider(#[from] OidcError),

    #[error("required claim {0:?} is missing from the ID token")]
    ClaimMissing(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCluster | Self::UnknownCluster(_) | Self::MissingCode => {
                StatusCode::BAD_REQUEST
            }
            Self::CsrfMismatch => StatusCode::FORBIDDEN,
            Self::Provider(_) | Self::ClaimMissing(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCluster => "MISSING_CLUSTER",
            Self::UnknownCluster(_) => "UNKNOWN_CLUSTER",
            Self::MissingCode => "MISSING_CODE",
            Self::CsrfMismatch => "CSRF_MISMATCH",
            Self::Provider(_) | Self::ClaimMissing(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Body sent to the browser. 4xx variants are precise; 5xx variants are
    /// deliberately generic.
    fn public_message(&self) -> String {
        match self {
            Self::MissingCluster | Self::UnknownCluster(_) | Self::MissingCode
            | Self::CsrfMismatch => self.to_string(),
            Self::Provider(_) | Self::ClaimMissing(_) | Self::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        match &self {
            ApiError::Provider(e) => {
                error!(error_code = code, error = %e, "provider error");
            }
            ApiError::ClaimMissing(claim) => {
                error!(error_code = code, claim = %claim, "missing required claim");
            }
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "internal error");
            }
            ApiError::CsrfMismatch => {
                warn!(error_code = code, "rejected callback with mismatched state");
            }
            _ => {
                tracing::debug!(error_code = code, message = %self, "client error");
            }
        }

        let body = ErrorResponse {
            error: self.public_message(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
