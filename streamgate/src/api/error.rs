//! API error handling.
//!
//! Provides consistent error responses for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Create a 403 Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Create a 409 Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// Create a 422 Unprocessable Entity error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InputInvalid => ApiError::bad_request("missing or invalid X-Source-Url"),
            Error::ProbeUnavailable(msg) => {
                tracing::error!("probe unavailable: {}", msg);
                ApiError::internal(format!("probe unavailable: {msg}"))
            }
            Error::ProbeTimeout(d) => {
                tracing::error!("probe timed out after {:?}", d);
                ApiError::internal("probe timed out")
            }
            Error::ProbeParse(msg) => {
                tracing::error!("probe parse error: {}", msg);
                ApiError::internal(format!("probe parse error: {msg}"))
            }
            Error::PlanRejected(msg) => {
                tracing::error!("plan rejected: {}", msg);
                ApiError::internal(format!("plan rejected: {msg}"))
            }
            Error::SubprocessStartFailed(msg) => {
                tracing::error!("subprocess start failed: {}", msg);
                ApiError::internal(format!("failed to start transcoder: {msg}"))
            }
            Error::SubprocessFailed(msg) => {
                tracing::error!("subprocess failed: {}", msg);
                ApiError::internal(format!("transcoder failed: {msg}"))
            }
            Error::IncompleteOutput => {
                tracing::error!("transcoder produced incomplete output");
                ApiError::internal("transcoder produced incomplete output")
            }
            Error::PlaylistInvalid(msg) => {
                tracing::warn!("playlist invalid: {}", msg);
                ApiError::internal(format!("playlist invalid: {msg}"))
            }
            Error::WaiterCancelled(path) => {
                ApiError::new(StatusCode::from_u16(499).unwrap(), "CLIENT_CLOSED_REQUEST", format!("wait for {path} cancelled by client"))
            }
            Error::Configuration(msg) => ApiError::bad_request(msg),
            Error::Io { op, path, source } => {
                tracing::error!("IO error while {} at {}: {}", op, path.display(), source);
                ApiError::internal("IO error occurred")
            }
            Error::IoPlain(e) => {
                tracing::error!("IO error: {}", e);
                ApiError::internal("IO error occurred")
            }
            Error::Serialization(e) => {
                tracing::error!("serialization error: {}", e);
                ApiError::internal("serialization error")
            }
            Error::Snapshot(msg) => {
                tracing::error!("snapshot error: {}", msg);
                ApiError::internal(format!("snapshot error: {msg}"))
            }
            Error::Other(msg) => {
                tracing::error!("unexpected error: {}", msg);
                ApiError::internal(msg)
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::not_found("User not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "User not found");
    }

    #[test]
    fn test_api_error_with_details() {
        let err = ApiError::validation("Invalid input")
            .with_details(serde_json::json!({"field": "email", "reason": "invalid format"}));
        
        assert!(err.details.is_some());
    }

    #[test]
    fn test_from_domain_error() {
        let domain_err = Error::InputInvalid;
        let api_err: ApiError = domain_err.into();

        assert_eq!(api_err.status, StatusCode::BAD_REQUEST);
    }
}
