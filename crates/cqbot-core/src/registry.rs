//! The event registry.
//!
//! Maps each [`EventKind`] to the handlers bound to it, in registration
//! order across all bots. Owned by the composition root and shared by `Arc`;
//! there is no process-wide instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::event::EventKind;
use crate::handler::{Handler, Handlers};

/// One handler bound to one event on behalf of one bot.
#[derive(Debug, Clone)]
pub struct HandlerRegistration {
    pub event: EventKind,
    /// Name of the owning bot module.
    pub bot: Arc<str>,
    pub handler: Handler,
}

/// Event name to ordered handler list.
#[derive(Default)]
pub struct EventRegistry {
    handlers: RwLock<HashMap<EventKind, Vec<HandlerRegistration>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every handler of a bot module. Returns how many were added.
    pub fn register(&self, bot: &str, handlers: Handlers) -> usize {
        let bot: Arc<str> = Arc::from(bot);
        let entries = handlers.into_entries();
        let count = entries.len();

        let mut map = self.handlers.write();
        for (event, handler) in entries {
            info!(bot = %bot, event = %event, "Registered event for bot");
            map.entry(event).or_default().push(HandlerRegistration {
                event,
                bot: Arc::clone(&bot),
                handler,
            });
        }

        count
    }

    /// The handlers bound to `event`, in registration order.
    pub fn lookup(&self, event: EventKind) -> Vec<HandlerRegistration> {
        self.handlers
            .read()
            .get(&event)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_handlers(&self, event: EventKind) -> bool {
        self.handlers
            .read()
            .get(&event)
            .is_some_and(|list| !list.is_empty())
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.handlers.read().len())
            .field("handlers", &self.len())
            .finish()
    }
}
