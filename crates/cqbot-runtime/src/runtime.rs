//! Runtime composition: config, bots, connection and frame routing.
//!
//! ```text
//!             ┌──────────────────── CqRuntime ────────────────────┐
//! socket ───▶ │ FrameRouter ──echo──▶ WsApiCaller ◀── Bot::call_api │
//!             │     │                                              │
//!             │     └─event─▶ classify ─▶ spawn(dispatch_propagated) │
//!             └───────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cqbot_runtime::CqRuntime;
//!
//! let mut runtime = CqRuntime::from_env()?;
//! runtime.register(EchoBot)?;
//! runtime.run().await?;
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cqbot_core::{Dispatcher, EventContext, EventKind, EventRegistry};
use cqbot_transport::{
    ApiCaller, ConnectionHandler, TransportError, WsApiCaller, connect_with_queue, outbound_queue,
};
use serde_json::Value;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::bot::{Bot, BotModule};
use crate::config::{CqConfig, load_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::store::DocumentStore;

/// How long shutdown waits for in-flight dispatches.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns the configuration, the registered bot modules and the shared
/// [`EventRegistry`].
pub struct CqRuntime {
    config: CqConfig,
    registry: Arc<EventRegistry>,
    modules: Vec<Arc<dyn BotModule>>,
    shutdown: CancellationToken,
}

impl CqRuntime {
    pub fn new(config: CqConfig) -> Self {
        Self {
            config,
            registry: Arc::new(EventRegistry::new()),
            modules: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Loads configuration from the default locations and initializes
    /// logging from its `[logging]` section.
    pub fn from_env() -> RuntimeResult<Self> {
        let config = load_config()?;
        logging::init_from_config(&config.logging);
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &CqConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Cancelling this token stops a running runtime.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Adds a bot module. Its handlers are registered when the runtime starts.
    pub fn register(&mut self, module: impl BotModule) -> RuntimeResult<()> {
        let name = module.name();
        if !is_valid_bot_name(name) {
            return Err(RuntimeError::InvalidBotName(name.to_string()));
        }
        if self.modules.iter().any(|m| m.name() == name) {
            return Err(RuntimeError::BotExists(name.to_string()));
        }
        debug!(bot = %name, "Bot module added");
        self.modules.push(Arc::new(module));
        Ok(())
    }

    /// Runs until Ctrl+C (or SIGTERM on unix).
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `until` resolves, the shutdown token is cancelled, or the
    /// connection is lost for good.
    pub async fn run_until<F>(self, until: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.modules.is_empty() {
            return Err(RuntimeError::NoBots);
        }

        let client = self.config.client_config();
        let (outbound_tx, outbound_rx) = outbound_queue();
        let api = Arc::new(WsApiCaller::new(outbound_tx.clone(), client.api_timeout));
        self.init_bots(api.clone()).await?;

        let router = Arc::new(FrameRouter::new(
            api,
            Dispatcher::new(Arc::clone(&self.registry)),
        ));
        let (handle, mut task) = connect_with_queue(
            client,
            router.clone(),
            self.shutdown.clone(),
            (outbound_tx, outbound_rx),
        )
        .await?;

        info!(
            bots = self.modules.len(),
            handlers = self.registry.len(),
            "init complete"
        );

        let lost = tokio::select! {
            biased;
            _ = until => {
                info!("Shutdown requested");
                None
            }
            _ = self.shutdown.cancelled() => None,
            joined = &mut task => Some(joined),
        };

        handle.close();
        let result = match lost {
            Some(joined) => {
                if let Err(e) = joined {
                    error!(error = %e, "Connection task failed");
                }
                error!("Connection lost for good");
                Err(RuntimeError::Transport(TransportError::ConnectionClosed {
                    reason: "reconnect gave up".to_string(),
                }))
            }
            None => {
                if let Err(e) = task.await {
                    warn!(error = %e, "Connection task failed during shutdown");
                }
                Ok(())
            }
        };

        router.drain(SHUTDOWN_GRACE).await;
        info!("Runtime stopped");
        result
    }

    /// Opens each module's store and registers its handlers.
    async fn init_bots(&self, api: Arc<dyn ApiCaller>) -> RuntimeResult<()> {
        let mut seen = HashSet::new();
        for module in &self.modules {
            let name = module.name().to_string();
            if !seen.insert(name.clone()) {
                return Err(RuntimeError::BotExists(name));
            }

            let store_error = |source| RuntimeError::Store {
                bot: name.clone(),
                source,
            };
            let store = DocumentStore::open(&self.config.data, &name).map_err(store_error)?;
            if let Some(defaults) = module.defaults() {
                store.defaults(defaults).await.map_err(store_error)?;
            }

            let bot = Bot::new(name.clone(), Arc::clone(&api), store);
            let handlers = Arc::clone(module).handlers(bot);
            let count = self.registry.register(&name, handlers);
            debug!(bot = %name, handlers = count, "Bot initialized");
        }
        Ok(())
    }
}

/// Names become `<data>/<name>.json`, so no separators or dots.
fn is_valid_bot_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    ctrl_c().await;
    info!("Received Ctrl+C, shutting down");
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Frame routing
// =============================================================================

/// Routes inbound frames: API responses to the caller, events to the
/// dispatcher. Handlers are called inline in arrival order; their futures
/// run as tracked tasks.
pub(crate) struct FrameRouter {
    api: Arc<WsApiCaller>,
    dispatcher: Dispatcher,
    tasks: TaskTracker,
}

impl FrameRouter {
    pub(crate) fn new(api: Arc<WsApiCaller>, dispatcher: Dispatcher) -> Self {
        Self {
            api,
            dispatcher,
            tasks: TaskTracker::new(),
        }
    }

    fn route(&self, frame: &str) {
        let value: Value = match serde_json::from_str(frame) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping frame that is not JSON");
                return;
            }
        };

        if self.api.on_incoming_response(&value) {
            return;
        }
        if value.get("post_type").is_none() && value.get("retcode").is_some() {
            // Response to a call that already timed out.
            return;
        }

        let ctx = match EventContext::from_value(value) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Dropping malformed event");
                return;
            }
        };
        let Some(kind) = EventKind::classify(&ctx) else {
            trace!(post_type = %ctx.post_type, "No event kind for frame");
            return;
        };

        // Handlers are called here, in arrival order. Only their futures are spawned.
        let pending = match self.dispatcher.invoke_propagated(kind, &ctx) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(event = %kind, error = %e, "Dropping event that does not normalize");
                return;
            }
        };
        self.tasks.spawn(async move {
            let report = pending.finish().await;
            if !report.is_success() {
                debug!(event = %kind, failures = report.failures.len(), "Dispatch finished with failures");
            }
        });
    }

    /// Waits up to `grace` for in-flight dispatches.
    pub(crate) async fn drain(&self, grace: Duration) {
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(remaining = self.tasks.len(), "Abandoning unfinished dispatches");
        }
    }
}

#[async_trait]
impl ConnectionHandler for FrameRouter {
    async fn on_connect(&self, url: &str) {
        info!(url = %url, "Connected to endpoint");
    }

    async fn on_frame(&self, frame: String) {
        self.route(&frame);
    }

    async fn on_disconnect(&self) {
        self.api.on_disconnect();
    }
}
