//! Inbound events: taxonomy, raw context and normalized records.

pub mod context;
pub mod kind;
pub mod normalized;

pub use context::{EventContext, Sender};
pub use kind::{EventCategory, EventKind, MessageEvent, NoticeEvent, RequestEvent};
pub use normalized::{Channel, NormalizedMessage, NormalizedNotice};
