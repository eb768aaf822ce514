//! Event dispatcher.
//!
//! The [`Dispatcher`] turns one classified inbound event into handler calls:
//!
//! 1. Handlers are looked up; with none registered dispatch is a no-op and the
//!    context is not even normalized
//! 2. Message events are normalized into a shared [`NormalizedMessage`],
//!    notice and request events into a [`NormalizedNotice`]
//! 3. Every handler is called in registration order, then all their futures
//!    are driven to completion together
//!
//! Steps 1 to 3 up to the calls are synchronous: [`Dispatcher::invoke`]
//! returns a [`PendingDispatch`] holding the futures, so a caller that must
//! keep events in arrival order can invoke inline and finish elsewhere.
//!
//! A handler that returns an error or panics, either while being called or
//! while its future runs, is recorded in the [`DispatchReport`] and logged.
//! Its siblings still run.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use thiserror::Error;
use tracing::{Instrument, Level, Span, debug, error, span};

use crate::error::EventError;
use crate::event::{EventCategory, EventContext, EventKind, NormalizedMessage, NormalizedNotice};
use crate::handler::{BoxFuture, Handler, HandlerResult};
use crate::registry::{EventRegistry, HandlerRegistration};

/// Why a handler invocation failed.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("handler returned an error: {0:#}")]
    Error(anyhow::Error),

    #[error("handler panicked: {0}")]
    Panic(String),

    /// The handler shape does not fit the event category.
    #[error("{0} handler bound to a {1} event")]
    Mismatch(&'static str, &'static str),
}

/// One failed handler invocation.
#[derive(Debug)]
pub struct HandlerFailure {
    pub event: EventKind,
    pub bot: Arc<str>,
    /// Position of the handler in the event's registration list.
    pub index: usize,
    pub cause: FailureCause,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler #{} of bot '{}' for {}: {}",
            self.index, self.bot, self.event, self.cause
        )
    }
}

/// Outcome of dispatching one event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of handlers that were called.
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    /// True when every invoked handler succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: DispatchReport) {
        self.invoked += other.invoked;
        self.failures.extend(other.failures);
    }
}

/// The normalized argument shared by all handlers of one dispatch.
enum Payload {
    Message(Arc<NormalizedMessage>),
    Notice(NormalizedNotice),
}

impl Payload {
    fn build(kind: EventKind, ctx: &EventContext) -> Result<Self, EventError> {
        Ok(match kind.category() {
            EventCategory::Message => Self::Message(Arc::new(NormalizedMessage::from_context(ctx)?)),
            EventCategory::Notice | EventCategory::Request => {
                Self::Notice(NormalizedNotice::from_context(ctx)?)
            }
        })
    }

    fn call(&self, handler: &Handler) -> Result<BoxFuture<'static, HandlerResult>, FailureCause> {
        match (self, handler) {
            (Self::Message(message), Handler::Message(h)) => Ok(h.call(
                message.origin_id,
                message.sender.clone(),
                Arc::clone(message),
            )),
            (Self::Notice(notice), Handler::Notice(h)) => Ok(h.call(notice.clone())),
            (Self::Message(_), Handler::Notice(_)) => {
                Err(FailureCause::Mismatch("notice", "message"))
            }
            (Self::Notice(_), Handler::Message(_)) => {
                Err(FailureCause::Mismatch("message", "notice"))
            }
        }
    }
}

/// Handler calls that have been made but whose futures are still running.
///
/// Produced by [`Dispatcher::invoke`]. Every handler has already been called
/// when this exists; [`finish`](Self::finish) only drives the returned
/// futures.
#[must_use = "handler futures do nothing until finished"]
pub struct PendingDispatch {
    span: Span,
    invoked: usize,
    /// Keyed by call sequence so the report keeps invocation order.
    failures: Vec<(usize, HandlerFailure)>,
    calls: Vec<PendingCall>,
}

struct PendingCall {
    seq: usize,
    event: EventKind,
    index: usize,
    bot: Arc<str>,
    future: BoxFuture<'static, HandlerResult>,
}

impl PendingDispatch {
    fn new(span: Span) -> Self {
        Self {
            span,
            invoked: 0,
            failures: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Number of handlers that were called.
    pub fn invoked(&self) -> usize {
        self.invoked
    }

    /// Number of handler futures still to be driven.
    pub fn outstanding(&self) -> usize {
        self.calls.len()
    }

    /// Calls every registration for `kind`, strictly in order.
    fn call_all(
        &mut self,
        kind: EventKind,
        payload: &Payload,
        registrations: Vec<HandlerRegistration>,
    ) {
        for (index, registration) in registrations.into_iter().enumerate() {
            let seq = self.invoked;
            self.invoked += 1;
            let called = catch_unwind(AssertUnwindSafe(|| payload.call(&registration.handler)));
            let cause = match called {
                Ok(Ok(future)) => {
                    self.calls.push(PendingCall {
                        seq,
                        event: kind,
                        index,
                        bot: registration.bot,
                        future,
                    });
                    continue;
                }
                Ok(Err(cause)) => cause,
                Err(panic) => FailureCause::Panic(panic_message(panic)),
            };
            self.failures
                .push((seq, failure(kind, registration.bot, index, cause)));
        }
    }

    /// Drives all handler futures together and collects the report.
    pub async fn finish(self) -> DispatchReport {
        let Self {
            span,
            invoked,
            mut failures,
            calls,
        } = self;

        async move {
            let outcomes = join_all(calls.into_iter().map(
                |PendingCall {
                     seq,
                     event,
                     index,
                     bot,
                     future,
                 }| async move {
                    let outcome = AssertUnwindSafe(future).catch_unwind().await;
                    (seq, event, index, bot, outcome)
                },
            ))
            .await;

            for (seq, event, index, bot, outcome) in outcomes {
                let cause = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => FailureCause::Error(err),
                    Err(panic) => FailureCause::Panic(panic_message(panic)),
                };
                failures.push((seq, failure(event, bot, index, cause)));
            }

            failures.sort_by_key(|(seq, _)| *seq);
            DispatchReport {
                invoked,
                failures: failures.into_iter().map(|(_, f)| f).collect(),
            }
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for PendingDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDispatch")
            .field("invoked", &self.invoked)
            .field("outstanding", &self.calls.len())
            .field("failures", &self.failures.len())
            .finish()
    }
}

/// Dispatches classified events to the handlers in an [`EventRegistry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<EventRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Calls every handler registered for `kind` and returns their futures
    /// unfinished.
    ///
    /// All handler calls happen before this returns, so events invoked one
    /// after another reach handlers in that order. The error case only covers
    /// a context that cannot be normalized, in which case no handler is
    /// called.
    pub fn invoke(&self, kind: EventKind, ctx: &EventContext) -> Result<PendingDispatch, EventError> {
        self.invoke_levels(kind, &[kind], ctx)
    }

    /// Like [`invoke`](Self::invoke), for `kind` and then each of its
    /// ancestors.
    ///
    /// The context is normalized once per level that has handlers, so a
    /// handler for `message.group` sees the same record whether the message
    /// mentioned the bot or not.
    pub fn invoke_propagated(
        &self,
        kind: EventKind,
        ctx: &EventContext,
    ) -> Result<PendingDispatch, EventError> {
        self.invoke_levels(kind, &kind.propagation(), ctx)
    }

    /// Invokes every handler registered for `kind` and waits for them.
    ///
    /// Resolves once all handler futures have finished. Handler failures are
    /// in the report.
    pub async fn dispatch(
        &self,
        kind: EventKind,
        ctx: &EventContext,
    ) -> Result<DispatchReport, EventError> {
        Ok(self.invoke(kind, ctx)?.finish().await)
    }

    /// Dispatches `kind` and each of its ancestors, then waits for every
    /// handler.
    pub async fn dispatch_propagated(
        &self,
        kind: EventKind,
        ctx: &EventContext,
    ) -> Result<DispatchReport, EventError> {
        Ok(self.invoke_propagated(kind, ctx)?.finish().await)
    }

    fn invoke_levels(
        &self,
        kind: EventKind,
        levels: &[EventKind],
        ctx: &EventContext,
    ) -> Result<PendingDispatch, EventError> {
        let span = span!(Level::DEBUG, "dispatch", event = %kind);
        let entered = span.enter();

        // Normalize every level first so a bad context calls nobody.
        let mut prepared = Vec::new();
        for &level in levels {
            let registrations = self.registry.lookup(level);
            if registrations.is_empty() {
                continue;
            }
            debug!(level = %level, handlers = registrations.len(), "Dispatching event");
            prepared.push((level, Payload::build(level, ctx)?, registrations));
        }

        let mut pending = PendingDispatch::new(span.clone());
        for (level, payload, registrations) in prepared {
            pending.call_all(level, &payload, registrations);
        }
        drop(entered);
        Ok(pending)
    }
}

fn failure(event: EventKind, bot: Arc<str>, index: usize, cause: FailureCause) -> HandlerFailure {
    error!(bot = %bot, event = %event, index, error = %cause, "Handler failed");
    HandlerFailure {
        event,
        bot,
        index,
        cause,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
