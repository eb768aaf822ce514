//! # cqbot core
//!
//! Message parsing and event dispatch for CQ-code chat bots.
//!
//! This crate has no I/O. It turns protocol strings into structured
//! messages and routes classified events to the handlers bot modules
//! registered.
//!
//! ## Layers
//!
//! - **Message**: CQ code extraction ([`extract_tags`]), the breakdown engine
//!   ([`breakdown`]) and the parsed representation ([`MessagePart`])
//! - **Event**: the fixed taxonomy ([`EventKind`]), the raw inbound
//!   [`EventContext`] and the normalized records handlers receive
//! - **Dispatch**: handler traits ([`MessageHandler`], [`NoticeHandler`]),
//!   the [`EventRegistry`] and the [`Dispatcher`]
//!
//! ```text
//! ┌──────────────┐  classify  ┌────────────┐  lookup  ┌───────────────┐
//! │ EventContext │───────────▶│ Dispatcher │─────────▶│ EventRegistry │
//! └──────────────┘            └─────┬──────┘          └───────────────┘
//!                                   │ normalize (breakdown)
//!                                   ▼
//!                        ┌──────────────────────┐
//!                        │ handler, handler, …  │
//!                        └──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cqbot_core::prelude::*;
//!
//! # async fn run() -> Result<(), EventError> {
//! let registry = Arc::new(EventRegistry::new());
//! registry.register(
//!     "echo",
//!     Handlers::new().message(
//!         MessageEvent::Group,
//!         |group: i64, _sender: Sender, message: Arc<NormalizedMessage>| async move {
//!             if let Some(("echo", args)) = message.command() {
//!                 println!("{group}: {}", args.len());
//!             }
//!             Ok(())
//!         },
//!     ),
//! );
//!
//! let ctx = EventContext::from_json(
//!     r#"{"post_type":"message","message_type":"group","message_id":1,
//!         "group_id":100,"user_id":42,"self_id":10,"time":0,"message":"/echo hi"}"#,
//! )?;
//! let kind = EventKind::classify(&ctx).expect("group message");
//! let report = Dispatcher::new(registry).dispatch(kind, &ctx).await?;
//! assert_eq!(report.invoked, 1);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod registry;

pub use dispatcher::{DispatchReport, Dispatcher, FailureCause, HandlerFailure, PendingDispatch};
pub use error::{EventError, EventResult};
pub use event::{
    Channel, EventCategory, EventContext, EventKind, MessageEvent, NormalizedMessage,
    NormalizedNotice, NoticeEvent, RequestEvent, Sender,
};
pub use handler::{BoxFuture, Handler, HandlerResult, Handlers, MessageHandler, NoticeHandler};
pub use message::{
    Argument, CqCode, MessagePart, MessageParts, ParseMode, Tag, breakdown, breakdown_plain,
    breakdown_with, escape_text, escape_value, extract_tags, unescape,
};
pub use registry::{EventRegistry, HandlerRegistration};

/// Prelude for common imports.
pub mod prelude {
    pub use super::dispatcher::{DispatchReport, Dispatcher};
    pub use super::error::EventError;
    pub use super::event::{
        Channel, EventContext, EventKind, MessageEvent, NormalizedMessage, NormalizedNotice,
        NoticeEvent, RequestEvent, Sender,
    };
    pub use super::handler::{HandlerResult, Handlers};
    pub use super::message::{CqCode, MessagePart, MessageParts, breakdown, breakdown_plain};
    pub use super::registry::EventRegistry;
}
