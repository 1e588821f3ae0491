//! Error types for the volunteer portal service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Portal error taxonomy
///
/// Validation and state-conflict errors are detected before any mutation
/// and returned synchronously; infrastructure failures collapse to an
/// opaque 500 so no datastore detail leaks to callers.
#[derive(Error, Debug)]
pub enum PortalError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Duplicate email or similar uniqueness conflict
    #[error("{0}")]
    Conflict(String),

    /// Illegal application lifecycle transition
    #[error("{0}")]
    InvalidState(String),

    /// Login failure; deliberately the same message for unknown email and
    /// wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, or expired credential on a guarded operation
    #[error("Unauthorized")]
    Unauthorized,

    /// Resolved identity lacks the required role
    #[error("Forbidden")]
    Forbidden,

    /// Unknown application or resource
    #[error("{0}")]
    NotFound(String),

    /// Infrastructure failure (database pool, session store)
    #[error("infrastructure error: {0}")]
    Infra(#[from] common::error::InfraError),

    /// Database query failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other internal failure
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Validation(_)
            | PortalError::Conflict(_)
            | PortalError::InvalidState(_) => StatusCode::BAD_REQUEST,
            PortalError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            PortalError::Unauthorized | PortalError::Forbidden => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Infra(_) | PortalError::Database(_) | PortalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for portal results
pub type PortalResult<T> = Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PortalError::Validation("Missing required fields".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::Conflict("A user with this email already exists".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::InvalidState("This application has already been processed".into())
                .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(PortalError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(PortalError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            PortalError::NotFound("Application not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PortalError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_do_not_leak_detail() {
        let err = PortalError::Internal(anyhow::anyhow!("connection refused to 10.0.0.5"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
