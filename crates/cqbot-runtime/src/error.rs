//! Runtime error types.

use std::path::PathBuf;

use cqbot_transport::TransportError;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Errors raised while starting or running the bot process.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to open store for bot '{bot}': {source}")]
    Store {
        bot: String,
        #[source]
        source: StoreError,
    },

    /// Names must be usable as a file stem.
    #[error("Invalid bot name: {0:?}")]
    InvalidBotName(String),

    /// Two modules registered under the same name.
    #[error("Bot already exists: {0}")]
    BotExists(String),

    #[error("No bot modules registered")]
    NoBots,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document or a defaults value is not a JSON object.
    #[error("Document is not a JSON object: {0}")]
    NotAnObject(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
