//! Transport and API error types.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by the WebSocket connection itself.
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

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// API Errors
// =============================================================================

/// Errors raised by an API call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No live connection to send the call over, or it dropped while waiting.
    #[error("bot is not connected")]
    NotConnected,

    /// No response arrived in time.
    #[error("API call timed out")]
    Timeout,

    /// The endpoint answered with a failure status.
    #[error("API call failed ({retcode}): {message}")]
    Failed {
        /// Protocol return code.
        retcode: i64,
        /// Message reported by the endpoint.
        message: String,
    },

    /// Request or response could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The request could not be handed to the transport.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
