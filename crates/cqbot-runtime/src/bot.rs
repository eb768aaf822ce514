//! Bot handles and bot modules.
//!
//! A [`BotModule`] is what an application writes: a name plus the handlers
//! it wants. At startup the runtime gives each module a [`Bot`], the handle
//! its handlers use to talk back:
//!
//! ```text
//! BotModule::handlers(bot) ──▶ Handlers ──▶ EventRegistry
//!                   │
//!                   └─ handlers capture `bot` and call
//!                      bot.reply / bot.send_group / bot.store().set
//! ```

use std::fmt;
use std::sync::Arc;

use cqbot_core::{Channel, Handlers, NormalizedMessage};
use cqbot_transport::{ApiCaller, ApiResult};
use serde_json::{Value, json};
use tracing::{Instrument, Span, debug, info_span, warn};

use crate::store::DocumentStore;

/// A bot module: named handlers plus optional store defaults.
///
/// ```rust,ignore
/// struct Echo;
///
/// impl BotModule for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn handlers(self: Arc<Self>, bot: Bot) -> Handlers {
///         Handlers::new().message(MessageEvent::Group, move |_, _, message| {
///             let bot = bot.clone();
///             async move {
///                 bot.reply(&message, message.plain_text()).await?;
///                 Ok(())
///             }
///         })
///     }
/// }
/// ```
pub trait BotModule: Send + Sync + 'static {
    /// Unique name. Also names the module's store document.
    fn name(&self) -> &str;

    /// Top-level keys written to the store when missing.
    fn defaults(&self) -> Option<Value> {
        None
    }

    /// Builds the handlers to register for this module.
    fn handlers(self: Arc<Self>, bot: Bot) -> Handlers;
}

/// Handle given to a bot module's handlers. Cheap to clone.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

struct BotInner {
    name: String,
    api: Arc<dyn ApiCaller>,
    store: DocumentStore,
    span: Span,
}

impl Bot {
    pub fn new(name: impl Into<String>, api: Arc<dyn ApiCaller>, store: DocumentStore) -> Self {
        let name = name.into();
        let span = info_span!("bot", name = %name);
        Self {
            inner: Arc::new(BotInner {
                name,
                api,
                store,
                span,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// This bot's persistent document.
    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    /// Span carrying the bot name. Outbound calls run inside it.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Calls any protocol action and returns the response `data`.
    pub async fn call_api(&self, action: &str, params: Value) -> ApiResult<Value> {
        let result = self
            .inner
            .api
            .call(action, params)
            .instrument(self.inner.span.clone())
            .await;
        if let Err(e) = &result {
            let _enter = self.inner.span.enter();
            warn!(action = %action, error = %e, "API call failed");
        }
        result
    }

    pub async fn send_private(&self, user_id: i64, text: impl Into<String>) -> ApiResult<Value> {
        let params = json!({ "user_id": user_id, "message": text.into() });
        self.call_api("send_private_msg", params).await
    }

    pub async fn send_group(&self, group_id: i64, text: impl Into<String>) -> ApiResult<Value> {
        let params = json!({ "group_id": group_id, "message": text.into() });
        self.call_api("send_group_msg", params).await
    }

    pub async fn send_discuss(&self, discuss_id: i64, text: impl Into<String>) -> ApiResult<Value> {
        let params = json!({ "discuss_id": discuss_id, "message": text.into() });
        self.call_api("send_discuss_msg", params).await
    }

    /// Sends `text` back to the conversation `message` came from.
    pub async fn reply(
        &self,
        message: &NormalizedMessage,
        text: impl Into<String>,
    ) -> ApiResult<Value> {
        debug!(parent: &self.inner.span, channel = message.channel.as_str(), origin = message.origin_id, "Replying");
        match message.channel {
            Channel::Private => self.send_private(message.origin_id, text).await,
            Channel::Group => self.send_group(message.origin_id, text).await,
            Channel::Discuss => self.send_discuss(message.origin_id, text).await,
        }
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.inner.name)
            .field("store", &self.inner.store.path())
            .finish_non_exhaustive()
    }
}
