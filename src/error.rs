//! Error types for Haven.

use std::time::Duration;

use thiserror::Error;

/// Common error type for Haven.
#[derive(Error, Debug)]
pub enum HavenError {
    /// The hosted backend answered with an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// A backend collaborator is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A backend call did not finish before its deadline.
    #[error("backend call timed out after {0:?}")]
    BackendTimeout(Duration),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HavenError {
    /// Whether the error means the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            HavenError::ServiceUnavailable(_) | HavenError::BackendTimeout(_)
        )
    }
}

impl From<reqwest::Error> for HavenError {
    fn from(e: reqwest::Error) -> Self {
        HavenError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for HavenError {
    fn from(e: serde_json::Error) -> Self {
        HavenError::Backend(format!("malformed payload: {e}"))
    }
}

/// Result type alias for Haven operations.
pub type Result<T> = std::result::Result<T, HavenError>;
