//! Error types for the HTTP request pipeline

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// Error type returned by handlers and transports
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while building, sending or processing a request
#[derive(Debug, Error)]
pub enum HttpError {
    /// Base URL or joined path is not a valid URL
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    /// Request could not be assembled
    #[error("Failed to build request: {0}")]
    Build(String),

    /// Transport failed to execute the request or read its body
    #[error("Request failed: {0}")]
    Transport(#[source] BoxError),

    /// A pre-request or error handler rejected the exchange
    #[error("Handler '{name}' failed: {reason}")]
    Handler { name: String, reason: String },

    /// Response status was not a success
    #[error("Unexpected status {0}")]
    Status(StatusCode),

    /// Response body could not be decoded
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A post-response handler failed and no error handler recovered it
    #[error("Cannot process request: {0}")]
    Process(#[source] BoxError),
}

impl HttpError {
    /// Creates a handler error.
    pub fn handler(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Handler {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let err = HttpError::handler("auth", "token expired");
        assert_eq!(err.to_string(), "Handler 'auth' failed: token expired");
    }

    #[test]
    fn test_status_error_display() {
        let err = HttpError::Status(StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Unexpected status 404 Not Found");
    }

    #[test]
    fn test_process_keeps_source() {
        let err = HttpError::Process("schema mismatch".into());
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "schema mismatch");
    }
}
