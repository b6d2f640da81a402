//! Error types shared across the Xiaoci crates.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur on the inbound or outbound link.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection dropped while reading.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Request send failed.
    #[error("failed to send request: {0}")]
    SendFailed(String),

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors returned by outbound API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,

    /// The backend answered with a non-zero retcode.
    #[error("API error ({retcode}): {message}")]
    Rejected {
        /// Backend return code.
        retcode: i64,
        /// Backend message or wording.
        message: String,
    },

    /// Failed to serialize the request or decode the response.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The request never reached the backend.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The sender does not support this call.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
