//! WebSocket client for the universal endpoint.
//!
//! One connection carries inbound event frames and outbound API requests.
//! Every inbound text frame is handed to a [`ConnectionHandler`]; outbound
//! frames are queued through the [`ConnectionHandle`].
//!
//! The initial connection is made eagerly so configuration mistakes surface
//! as an error from [`connect`]. After that the client loop owns the socket
//! and reconnects with exponential backoff until the shutdown token fires or
//! retries run out.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::config::{Backoff, ClientConfig};
use crate::error::{TransportError, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives connection lifecycle callbacks and inbound frames.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Called after every successful (re)connection.
    async fn on_connect(&self, _url: &str) {}

    /// Called for every inbound text frame, in arrival order.
    async fn on_frame(&self, frame: String);

    /// Called when the connection is lost or closed.
    async fn on_disconnect(&self) {}
}

/// Handle for sending frames over a live client connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Queues a text frame.
    pub async fn send(&self, frame: String) -> TransportResult<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// The outbound queue, for an [`ApiCaller`](crate::ApiCaller).
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.outbound.clone()
    }

    /// Stops the client loop.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Capacity of the outbound frame queue.
const OUTBOUND_CAPACITY: usize = 256;

/// Creates an outbound frame queue for [`connect_with_queue`].
///
/// Lets an [`ApiCaller`](crate::ApiCaller) be built from the sender before
/// the connection exists.
pub fn outbound_queue() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// Connects to the endpoint and spawns the client loop.
///
/// The returned task finishes when the connection is closed for good.
pub async fn connect(
    config: ClientConfig,
    handler: Arc<dyn ConnectionHandler>,
    shutdown: CancellationToken,
) -> TransportResult<(ConnectionHandle, JoinHandle<()>)> {
    connect_with_queue(config, handler, shutdown, outbound_queue()).await
}

/// Like [`connect`], draining a queue created up front by [`outbound_queue`].
pub async fn connect_with_queue(
    config: ClientConfig,
    handler: Arc<dyn ConnectionHandler>,
    shutdown: CancellationToken,
    (outbound_tx, outbound_rx): (mpsc::Sender<String>, mpsc::Receiver<String>),
) -> TransportResult<(ConnectionHandle, JoinHandle<()>)> {
    info!(url = %config.url, "Connecting to WebSocket server");

    let (ws_stream, _response) =
        connect_async(build_request(&config)?)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;

    info!(url = %config.url, "WebSocket client connected");

    let handle = ConnectionHandle {
        outbound: outbound_tx,
        shutdown: shutdown.clone(),
    };

    let task = tokio::spawn(run_client_loop(
        ws_stream,
        outbound_rx,
        shutdown,
        handler,
        config,
    ));

    Ok((handle, task))
}

/// Builds the handshake request, attaching the access token if configured.
fn build_request(config: &ClientConfig) -> TransportResult<Request> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidConfig(format!("{}: {e}", config.url)))?;

    if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::InvalidConfig(format!("access token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    Ok(request)
}

/// Why a connection stopped being driven.
enum Exit {
    Shutdown,
    Lost(TransportError),
}

/// Runs the WebSocket client loop with reconnection support.
async fn run_client_loop(
    ws_stream: WsStream,
    mut outbound: mpsc::Receiver<String>,
    shutdown: CancellationToken,
    handler: Arc<dyn ConnectionHandler>,
    config: ClientConfig,
) {
    let mut backoff = Backoff::new(&config);
    let mut next = Some(ws_stream);

    loop {
        let ws = match next.take() {
            Some(ws) => ws,
            None => match reconnect(&config, &mut backoff, &shutdown).await {
                Some(ws) => ws,
                None => break,
            },
        };

        handler.on_connect(&config.url).await;
        let exit = drive(ws, &mut outbound, &shutdown, &handler, &mut backoff).await;
        handler.on_disconnect().await;

        match exit {
            Exit::Shutdown => {
                info!(url = %config.url, "WebSocket client shutting down");
                break;
            }
            Exit::Lost(reason) if config.auto_reconnect => {
                warn!(url = %config.url, error = %reason, "Connection lost");
            }
            Exit::Lost(reason) => {
                error!(url = %config.url, error = %reason, "Connection lost, reconnect disabled");
                break;
            }
        }
    }
}

/// Pumps frames in both directions until the connection ends.
async fn drive(
    ws: WsStream,
    outbound: &mut mpsc::Receiver<String>,
    shutdown: &CancellationToken,
    handler: &Arc<dyn ConnectionHandler>,
    backoff: &mut Backoff,
) -> Exit {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = ws_tx.close().await;
                return Exit::Shutdown;
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = ws_tx.close().await;
                    return Exit::Shutdown;
                };
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    warn!(error = %e, "Failed to send frame");
                    return Exit::Lost(TransportError::SendFailed(e.to_string()));
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Received text");
                        backoff.reset();
                        handler.on_frame(text.as_str().to_owned()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        trace!(len = data.len(), "Received binary");
                        backoff.reset();
                        handler.on_frame(String::from_utf8_lossy(&data).into_owned()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        trace!("Received ping, sending pong");
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_owned())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return Exit::Lost(TransportError::ConnectionClosed { reason });
                    }
                    Some(Err(e)) => {
                        return Exit::Lost(TransportError::ConnectionClosed { reason: e.to_string() });
                    }
                    None => {
                        return Exit::Lost(TransportError::ConnectionClosed {
                            reason: "stream ended".to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Reconnects with exponential backoff. `None` means give up.
async fn reconnect(
    config: &ClientConfig,
    backoff: &mut Backoff,
    shutdown: &CancellationToken,
) -> Option<WsStream> {
    loop {
        let Some(delay) = backoff.next_delay() else {
            error!(url = %config.url, "Max retries reached, giving up");
            return None;
        };

        warn!(url = %config.url, delay = ?delay, "Reconnecting...");
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let request = match build_request(config) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Cannot build reconnect request");
                return None;
            }
        };

        match connect_async(request).await {
            Ok((ws, _)) => {
                info!(url = %config.url, "Reconnected successfully");
                return Some(ws);
            }
            Err(e) => warn!(url = %config.url, error = %e, "Reconnection failed"),
        }
    }
}
