//! Error types for event handling.
//!
//! Parsing never fails: malformed markup and malformed commands degrade to
//! plain text. Errors only arise when an inbound event cannot be turned into a
//! normalized record.

use thiserror::Error;

/// Errors raised while classifying or normalizing an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The event name is not part of the taxonomy.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The frame is not a valid event object.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// A field required to normalize the event is absent.
    #[error("event is missing required field '{0}'")]
    MissingField(&'static str),

    /// The `message_type` is none of private, group or discuss.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The `time` field is outside the representable range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Convenience result alias.
pub type EventResult<T> = Result<T, EventError>;
