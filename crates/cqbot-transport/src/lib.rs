//! # cqbot transport
//!
//! WebSocket connection to a CQHTTP / OneBot v11 endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  cqbot-runtime      │  (routes frames, owns bots)
//! ├─────────────────────┤
//! │  cqbot-transport    │  <- This crate
//! │  ws_client │ api    │
//! ├─────────────────────┤
//! │  Network (TCP/WS)   │
//! └─────────────────────┘
//! ```
//!
//! | Item | Description |
//! |------|-------------|
//! | [`connect`] | Opens the universal endpoint and spawns the client loop |
//! | [`ConnectionHandler`] | Receives inbound frames and lifecycle callbacks |
//! | [`WsApiCaller`] | Echo-matched request/response over the same socket |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cqbot_transport::{ClientConfig, WsApiCaller, connect};
//!
//! let config = ClientConfig::new("localhost", 6700).with_token("secret");
//! let (handle, task) = connect(config.clone(), handler, shutdown).await?;
//! let api = WsApiCaller::new(handle.sender(), config.api_timeout);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ws_client;

pub use api::{ApiCaller, WsApiCaller};
pub use config::{ClientConfig, endpoint_url};
pub use error::{ApiError, ApiResult, TransportError, TransportResult};
pub use ws_client::{
    ConnectionHandle, ConnectionHandler, connect, connect_with_queue, outbound_queue,
};
