//! Error types for the Kaiwa client.
//!
//! Every fallible operation in this crate returns [`KaiwaError`]. The variants
//! separate the four failure domains a caller may want to handle differently:
//! invalid input (no network I/O happened), transport failure (no HTTP
//! semantics available), an API-level rejection (the server answered with a
//! non-2xx status and an error payload), and an unparseable response.

use thiserror::Error;

/// Unified error type for all Kaiwa API operations.
#[derive(Error, Debug)]
pub enum KaiwaError {
    /// Caller-supplied parameters failed a validation rule.
    ///
    /// Raised before any network I/O; the message names the first rule that
    /// failed.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The connection could not be established or the read failed.
    ///
    /// No HTTP status is available. The library does not retry; callers may
    /// retry with backoff.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server returned a non-2xx status with a parseable error payload.
    #[error("API error {code}: {message}")]
    ApiError {
        /// HTTP status code
        code: u16,
        /// First error message reported by the server
        message: String,
        /// Raw response body, when it decoded as JSON
        details: Option<serde_json::Value>,
    },

    /// The response body was not valid JSON when JSON was expected.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The invoked operation is deliberately disabled.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Client-side configuration problem (bad header value, malformed URL).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Local I/O failure, e.g. reading a file scheduled for upload.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl KaiwaError {
    /// Convenience constructor for API errors without extra details.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether retrying the same call might succeed.
    ///
    /// Transport failures and 5xx/429 responses are considered transient.
    /// The library itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(_) => true,
            Self::ApiError { code, .. } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for KaiwaError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for KaiwaError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for KaiwaError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_only_on_api_errors() {
        assert_eq!(KaiwaError::api_error(404, "not found").status_code(), Some(404));
        assert_eq!(KaiwaError::HttpError("refused".into()).status_code(), None);
    }

    #[test]
    fn retryable_classification() {
        assert!(KaiwaError::HttpError("timeout".into()).is_retryable());
        assert!(KaiwaError::api_error(503, "unavailable").is_retryable());
        assert!(KaiwaError::api_error(429, "slow down").is_retryable());
        assert!(!KaiwaError::api_error(400, "bad request").is_retryable());
        assert!(!KaiwaError::InvalidParameter("room_id must be integer.".into()).is_retryable());
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: KaiwaError = json_err.into();
        assert!(matches!(err, KaiwaError::ParseError(_)));
    }
}
