//! Error Types for the Tessera Gateway
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Error bodies share the failure envelope shape, `{success:false, error}`,
//! plus a machine-readable `code` and, for token failures, a `reason`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_core::{StorageError, TesseraError, TokenRejection};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for gateway responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Missing or unknown gateway key
    Unauthorized,

    /// Capability token refused; `reason` says why
    InvalidToken,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Required header or field is missing
    MissingField,

    /// Request body or parameter is invalid
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No instance is bound under the requested name
    DatabaseNotFound,

    /// No such endpoint
    RouteNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// A database with this name already exists
    AlreadyExists,

    // ========================================================================
    // Throttling and Server Errors (429, 500)
    // ========================================================================
    /// Request rate limit exceeded
    TooManyRequests,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::MissingField | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::DatabaseNotFound | ErrorCode::RouteNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Invalid gateway key",
            ErrorCode::InvalidToken => "Invalid capability token",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::DatabaseNotFound => "Database not found",
            ErrorCode::RouteNotFound => "Route not found",
            ErrorCode::AlreadyExists => "Database already exists",
            ErrorCode::TooManyRequests => "Rate limit exceeded",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for gateway operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Token rejection reason (`malformed`, `dbname_mismatch`, `expired`, `bad_sig`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create an InvalidToken error carrying the rejection reason.
    pub fn invalid_token(rejection: TokenRejection) -> Self {
        Self {
            code: ErrorCode::InvalidToken,
            message: format!("Invalid capability token: {}", rejection.reason()),
            reason: Some(rejection.reason().to_string()),
        }
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn database_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::DatabaseNotFound,
            format!("Database '{}' not found", name),
        )
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::new(ErrorCode::RouteNotFound, format!("No route for {}", path))
    }

    /// Create a TooManyRequests error.
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::TooManyRequests, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Wire body of an error response.
#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            error: &self.message,
            code: self.code,
            reason: self.reason.as_deref(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InstanceNotFound { name } => ApiError::database_not_found(&name),
            StorageError::InstanceExists { name } => ApiError::new(
                ErrorCode::AlreadyExists,
                format!("Database '{}' already exists", name),
            ),
            other => {
                tracing::error!(error = %other, "Storage error");
                ApiError::internal_error(other.to_string())
            }
        }
    }
}

impl From<TesseraError> for ApiError {
    fn from(err: TesseraError) -> Self {
        match err {
            TesseraError::Storage(e) => e.into(),
            TesseraError::Validation(e) => ApiError::invalid_input(e.to_string()),
            other => {
                tracing::error!(error = %other, "Tessera error");
                ApiError::internal_error(other.to_string())
            }
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::MissingField.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::DatabaseNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::RouteNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::TooManyRequests.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_invalid_token_carries_reason() {
        let err = ApiError::invalid_token(TokenRejection::Expired);
        assert_eq!(err.code, ErrorCode::InvalidToken);
        assert_eq!(err.reason.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_response_body_is_failure_envelope() -> Result<(), Box<dyn std::error::Error>> {
        let response = ApiError::invalid_token(TokenRejection::BadSig).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_TOKEN");
        assert_eq!(body["reason"], "bad_sig");
        assert!(body["error"].as_str().is_some());
        Ok(())
    }

    #[test]
    fn test_storage_errors_map_to_status() {
        let missing: ApiError = StorageError::InstanceNotFound {
            name: "tenant-1".to_string(),
        }
        .into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let exists: ApiError = StorageError::InstanceExists {
            name: "tenant-1".to_string(),
        }
        .into();
        assert_eq!(exists.code, ErrorCode::AlreadyExists);
    }
}
