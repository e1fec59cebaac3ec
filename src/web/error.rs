//! API error handling for the Haven HTTP surface.
//!
//! Errors render as `{"error": message, "code": "SCREAMING_CASE"}` with an
//! optional `details` map of field-level messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::upload::ProfileUploadError;
use crate::HavenError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Field-level validation failure (400).
    ValidationError,
    /// Unauthorized (401).
    Unauthorized,
    /// Forbidden (403).
    Forbidden,
    /// Not found (404).
    NotFound,
    /// Payload too large (413).
    PayloadTooLarge,
    /// Unsupported media type (415).
    UnsupportedMediaType,
    /// Too many requests (429).
    TooManyRequests,
    /// Internal server error (500).
    InternalError,
    /// Service unavailable (503).
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Error code.
    pub code: ErrorCode,
    /// Field-level validation error details (only present for validation errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Message sent to the client.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a payload too large error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    /// Create an unsupported media type error.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedMediaType, message)
    }

    /// Create a rate limit error.
    pub fn too_many_requests() -> Self {
        Self::new(ErrorCode::TooManyRequests, "Too many requests")
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a service unavailable error.
    pub fn service_unavailable() -> Self {
        Self::new(ErrorCode::ServiceUnavailable, "Service unavailable")
    }

    /// Create a validation error with field-level details.
    pub fn validation(details: HashMap<String, Vec<String>>) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details: HashMap<String, Vec<String>> = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {field}"))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        Self::validation(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: self.message,
            code: self.code,
            details: self.details,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<HavenError> for ApiError {
    fn from(err: HavenError) -> Self {
        match &err {
            HavenError::Auth(_) => ApiError::unauthorized("Unauthorized"),
            HavenError::Permission(_) => ApiError::forbidden("Unauthorized"),
            HavenError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            HavenError::Validation(msg) => ApiError::bad_request(msg.clone()),
            HavenError::ServiceUnavailable(what) => {
                tracing::warn!(service = %what, "Backend not configured");
                ApiError::service_unavailable()
            }
            HavenError::BackendTimeout(_) => ApiError::service_unavailable(),
            HavenError::Backend(msg) => {
                tracing::error!(error = %msg, "Backend error");
                ApiError::internal(msg.clone())
            }
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<ProfileUploadError> for ApiError {
    fn from(err: ProfileUploadError) -> Self {
        let message = err.to_string();
        match err {
            ProfileUploadError::MissingLeaderId | ProfileUploadError::MissingFilename => {
                ApiError::bad_request(message)
            }
            ProfileUploadError::InvalidType => ApiError::unsupported_media_type(message),
            ProfileUploadError::TooLarge => ApiError::payload_too_large(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::ValidationError.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ErrorCode::UnsupportedMediaType.status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ErrorCode::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_from_haven_error() {
        let err: ApiError = HavenError::BackendTimeout(Duration::from_secs(1)).into();
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
        assert_eq!(err.message(), "Service unavailable");

        let err: ApiError = HavenError::ServiceUnavailable("storage".into()).into();
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);

        let err: ApiError = HavenError::Backend("duplicate key".into()).into();
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.message(), "duplicate key");

        let err: ApiError = HavenError::NotFound("story".into()).into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: ApiError = HavenError::Config("boom".into()).into();
        assert_eq!(err.message(), "An internal error occurred");
    }

    #[test]
    fn test_from_profile_upload_error() {
        let err: ApiError = ProfileUploadError::InvalidType.into();
        assert_eq!(err.code(), ErrorCode::UnsupportedMediaType);
        assert_eq!(err.message(), "Invalid file type");

        let err: ApiError = ProfileUploadError::TooLarge.into();
        assert_eq!(err.code(), ErrorCode::PayloadTooLarge);

        let err: ApiError = ProfileUploadError::MissingLeaderId.into();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_validation_error() {
        let mut details = HashMap::new();
        details.insert("title".to_string(), vec!["Must not be empty".to_string()]);

        let err = ApiError::validation(details);
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Validation failed");
        assert_eq!(
            err.details.unwrap().get("title").unwrap(),
            &vec!["Must not be empty".to_string()]
        );
    }

    #[test]
    fn test_body_shape() {
        let body = ErrorBody {
            error: "Too many requests".into(),
            code: ErrorCode::TooManyRequests,
            details: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"error": "Too many requests", "code": "TOO_MANY_REQUESTS"})
        );
    }
}
