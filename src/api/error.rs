//! API error types for the comparison REST client.

use thiserror::Error;

/// API-specific error type for the comparison REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP/network error from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request parameters (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Too many requests (429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// JSON deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(String),

    /// Invalid parameter provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unexpected HTTP status code
    #[error("Unexpected status {0}: {1}")]
    UnexpectedStatus(u16, String),
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error body returned by the comparison service, `{"error": "..."}`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    #[serde(default, alias = "error")]
    pub message: Option<String>,
    /// Additional error details
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Wrap a non-JSON body.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            details: None,
        }
    }

    /// Get the error message, preferring `message` over `details`.
    pub fn get_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.details.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_alias() {
        let body: ErrorResponse = serde_json::from_str(r#"{"error":"unknown route"}"#).unwrap();
        assert_eq!(body.get_message(), "unknown route");

        let body: ErrorResponse = serde_json::from_str(r#"{"details":"missing city"}"#).unwrap();
        assert_eq!(body.get_message(), "missing city");

        assert_eq!(ErrorResponse::default().get_message(), "Unknown error");
    }
}
