//! Process configuration.
//!
//! Loaded once at startup by [`ConfigLoader`] and validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config};
pub use schema::{CqConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEvents};
pub use validation::validate_config;
