//! Handler traits and the declarative [`Handlers`] table.
//!
//! A bot module describes what it listens to by building a [`Handlers`]
//! value. The builder methods take the event sub-enums, so binding a message
//! handler to a notice event does not compile.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cqbot_core::event::{MessageEvent, NormalizedMessage, NormalizedNotice, NoticeEvent, Sender};
//! use cqbot_core::handler::Handlers;
//!
//! let handlers = Handlers::new()
//!     .message(
//!         MessageEvent::Group,
//!         |origin: i64, _sender: Sender, message: Arc<NormalizedMessage>| async move {
//!             println!("{origin}: {}", message.text);
//!             Ok(())
//!         },
//!     )
//!     .notice(NoticeEvent::FriendAdd, |notice: NormalizedNotice| async move {
//!         println!("new friend {}", notice.user_id);
//!         Ok(())
//!     });
//!
//! assert_eq!(handlers.len(), 2);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::event::{
    EventKind, MessageEvent, NormalizedMessage, NormalizedNotice, NoticeEvent, RequestEvent,
    Sender,
};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every handler resolves to.
pub type HandlerResult = anyhow::Result<()>;

// ============================================================================
// Handler traits
// ============================================================================

/// Handles message events.
///
/// Implemented for any `Fn(i64, Sender, Arc<NormalizedMessage>) -> Future`
/// whose future resolves to [`HandlerResult`].
pub trait MessageHandler: Send + Sync + 'static {
    fn call(
        &self,
        origin_id: i64,
        sender: Sender,
        message: Arc<NormalizedMessage>,
    ) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> MessageHandler for F
where
    F: Fn(i64, Sender, Arc<NormalizedMessage>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(
        &self,
        origin_id: i64,
        sender: Sender,
        message: Arc<NormalizedMessage>,
    ) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(origin_id, sender, message))
    }
}

/// Handles notice and request events.
pub trait NoticeHandler: Send + Sync + 'static {
    fn call(&self, notice: NormalizedNotice) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> NoticeHandler for F
where
    F: Fn(NormalizedNotice) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, notice: NormalizedNotice) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(notice))
    }
}

/// A type-erased handler of either shape.
#[derive(Clone)]
pub enum Handler {
    Message(Arc<dyn MessageHandler>),
    Notice(Arc<dyn NoticeHandler>),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(_) => f.write_str("Handler::Message"),
            Self::Notice(_) => f.write_str("Handler::Notice"),
        }
    }
}

// ============================================================================
// Handlers table
// ============================================================================

/// The events a bot module listens to, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Handlers {
    entries: Vec<(EventKind, Handler)>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a message handler.
    pub fn message<F, Fut>(self, event: MessageEvent, handler: F) -> Self
    where
        F: Fn(i64, Sender, Arc<NormalizedMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.messages([event], handler)
    }

    /// Binds one message handler to several events.
    pub fn messages<F, Fut, I>(mut self, events: I, handler: F) -> Self
    where
        F: Fn(i64, Sender, Arc<NormalizedMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
        I: IntoIterator<Item = MessageEvent>,
    {
        let handler: Arc<dyn MessageHandler> = Arc::new(handler);
        for event in events {
            self.entries
                .push((event.into(), Handler::Message(Arc::clone(&handler))));
        }
        self
    }

    /// Binds a notice handler.
    pub fn notice<F, Fut>(mut self, event: NoticeEvent, handler: F) -> Self
    where
        F: Fn(NormalizedNotice) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.entries
            .push((event.into(), Handler::Notice(Arc::new(handler))));
        self
    }

    /// Binds a request handler. Requests share the notice record.
    pub fn request<F, Fut>(mut self, event: RequestEvent, handler: F) -> Self
    where
        F: Fn(NormalizedNotice) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.entries
            .push((event.into(), Handler::Notice(Arc::new(handler))));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The bound events in declaration order.
    pub fn events(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.entries.iter().map(|(event, _)| *event)
    }

    pub(crate) fn into_entries(self) -> Vec<(EventKind, Handler)> {
        self.entries
    }
}
