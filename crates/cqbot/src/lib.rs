//! # cqbot
//!
//! A framework for chat bots speaking the OneBot v11 string format, where
//! messages are plain text with embedded CQ codes such as `[CQ:at,qq=123]`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  frames  ┌────────────┐  classify  ┌────────────┐
//! │  transport  │─────────▶│  runtime   │───────────▶│ Dispatcher │──▶ bot module handlers
//! │ (WebSocket) │◀─────────│ (Bot, ...) │            └────────────┘
//! └─────────────┘  actions └────────────┘
//! ```
//!
//! - **core**: CQ code parsing, the message breakdown engine, the event
//!   taxonomy, the registry and the dispatcher
//! - **transport**: the WebSocket connection and echo-matched API calls
//! - **runtime**: configuration, logging, per-bot stores and the [`Bot`](prelude::Bot) handle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use cqbot::prelude::*;
//!
//! struct Echo;
//!
//! impl BotModule for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn handlers(self: Arc<Self>, bot: Bot) -> Handlers {
//!         Handlers::new().message(MessageEvent::Group, move |_, _, message| {
//!             let bot = bot.clone();
//!             async move {
//!                 if let Some(("echo", _)) = message.command() {
//!                     bot.reply(&message, message.plain_text()).await?;
//!                 }
//!                 Ok(())
//!             }
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = CqRuntime::from_env()?;
//!     runtime.register(Echo)?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub use cqbot_core as core;
pub use cqbot_runtime as runtime;
pub use cqbot_transport as transport;

/// Commonly used types for writing bot modules.
///
/// ```rust,ignore
/// use cqbot::prelude::*;
/// ```
pub mod prelude {
    // Runtime entry point and bot modules
    pub use cqbot_runtime::{Bot, BotModule, CqRuntime, DocumentStore};

    // Events and handlers
    pub use cqbot_core::{
        Channel, EventKind, HandlerResult, Handlers, MessageEvent, NormalizedMessage,
        NormalizedNotice, NoticeEvent, RequestEvent, Sender,
    };

    // Message parsing and building
    pub use cqbot_core::{
        Argument, CqCode, MessagePart, MessageParts, breakdown, breakdown_plain, escape_text,
    };

    pub use cqbot_transport::{ApiError, ApiResult};
}
