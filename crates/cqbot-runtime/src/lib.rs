//! # cqbot runtime
//!
//! Composition layer for cqbot: loads configuration, initializes logging,
//! gives every bot module a [`Bot`] handle with its own [`DocumentStore`],
//! and connects the transport to the event dispatcher.
//!
//! ```ignore
//! use cqbot_runtime::CqRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = CqRuntime::from_env()?;
//!     runtime.register(MyBot::default())?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod store;

pub use bot::{Bot, BotModule};
pub use config::{ConfigError, ConfigLoader, ConfigResult, CqConfig, LoggingConfig, load_config};
pub use error::{RuntimeError, RuntimeResult, StoreError, StoreResult};
pub use logging::LoggingBuilder;
pub use runtime::CqRuntime;
pub use store::{Document, DocumentStore};

// Re-export tracing for use by bot modules
pub use tracing;
