//! Echo-matched API calls over the WebSocket connection.
//!
//! Requests and events share one connection. Each request carries a numeric
//! `echo`; the response repeats it and is routed back to the waiting call.
//!
//! ```text
//! call("send_group_msg", params)
//!   │  {"action":"send_group_msg","params":{…},"echo":7}
//!   ▼
//! outbound channel ──▶ socket ──▶ endpoint
//!                                    │ {"status":"ok","retcode":0,"data":{…},"echo":7}
//! on_incoming_response ◀─────────────┘
//!   │
//!   ▼ resolves the pending call #7 with `data`
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{ApiError, ApiResult};

/// Issues protocol actions.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Makes an API call and returns the response `data`.
    async fn call(&self, action: &str, params: Value) -> ApiResult<Value>;

    /// Offers an inbound frame. Returns `true` if it was a response to a
    /// pending call and has been consumed.
    fn on_incoming_response(&self, _frame: &Value) -> bool {
        false
    }

    /// Fails every pending call with [`ApiError::NotConnected`].
    fn on_disconnect(&self) {}
}

/// [`ApiCaller`] for the WebSocket client.
pub struct WsApiCaller {
    outbound: mpsc::Sender<String>,
    /// echo → waiting call.
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    echo_counter: AtomicU64,
    api_timeout: Duration,
}

impl WsApiCaller {
    pub fn new(outbound: mpsc::Sender<String>, api_timeout: Duration) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            echo_counter: AtomicU64::new(1),
            api_timeout,
        }
    }

    /// Number of calls waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl ApiCaller for WsApiCaller {
    async fn call(&self, action: &str, params: Value) -> ApiResult<Value> {
        let echo = self.echo_counter.fetch_add(1, Ordering::Relaxed);

        // Registered before sending so an early response is never missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(echo, tx);

        let request = json!({
            "action": action,
            "params": params,
            "echo": echo,
        });
        debug!(action = %action, echo, "Calling API");

        if self.outbound.send(request.to_string()).await.is_err() {
            self.pending.lock().remove(&echo);
            return Err(ApiError::NotConnected);
        }

        let response = match timeout(self.api_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(ApiError::NotConnected),
            Err(_) => {
                self.pending.lock().remove(&echo);
                return Err(ApiError::Timeout);
            }
        };
        trace!(response = %response, "API response");

        check_response(response)
    }

    fn on_incoming_response(&self, frame: &Value) -> bool {
        let Some(echo) = frame.get("echo").and_then(Value::as_u64) else {
            return false;
        };
        let Some(tx) = self.pending.lock().remove(&echo) else {
            warn!(echo, "Received API response for unknown echo (timed out?)");
            return false;
        };
        let _ = tx.send(frame.clone());
        true
    }

    fn on_disconnect(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            debug!(count = pending.len(), "Failing pending API calls after disconnect");
            pending.clear();
        }
    }
}

/// Maps a response frame to its `data` or an [`ApiError::Failed`].
fn check_response(response: Value) -> ApiResult<Value> {
    let retcode = response.get("retcode").and_then(Value::as_i64).unwrap_or(0);
    let failed = response.get("status").and_then(Value::as_str) == Some("failed");

    if retcode != 0 || failed {
        let message = response
            .get("message")
            .or_else(|| response.get("wording"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(ApiError::Failed { retcode, message });
    }

    Ok(response.get("data").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Answers each request on `rx` with `respond(request)`.
    fn spawn_endpoint(
        caller: Arc<WsApiCaller>,
        mut rx: mpsc::Receiver<String>,
        respond: fn(&Value) -> Value,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let request: Value = serde_json::from_str(&frame).unwrap();
                let mut response = respond(&request);
                response["echo"] = request["echo"].clone();
                caller.on_incoming_response(&response);
            }
        });
    }

    #[tokio::test]
    async fn test_call_resolves_with_data() {
        let (tx, rx) = mpsc::channel(8);
        let caller = Arc::new(WsApiCaller::new(tx, Duration::from_secs(5)));
        spawn_endpoint(Arc::clone(&caller), rx, |request| {
            assert_eq!(request["action"], "send_group_msg");
            assert_eq!(request["params"]["group_id"], 100);
            json!({"status": "ok", "retcode": 0, "data": {"message_id": 55}})
        });

        let data = caller
            .call("send_group_msg", json!({"group_id": 100, "message": "hi"}))
            .await
            .unwrap();
        assert_eq!(data["message_id"], 55);
        assert_eq!(caller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_status() {
        let (tx, rx) = mpsc::channel(8);
        let caller = Arc::new(WsApiCaller::new(tx, Duration::from_secs(5)));
        spawn_endpoint(Arc::clone(&caller), rx, |_| {
            json!({"status": "failed", "retcode": 100, "wording": "bad group"})
        });

        let err = caller.call("send_group_msg", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Failed { retcode: 100, ref message } if message == "bad group"
        ));
    }

    #[tokio::test]
    async fn test_timeout_clears_pending() {
        let (tx, _rx) = mpsc::channel(8);
        let caller = WsApiCaller::new(tx, Duration::from_millis(20));

        let err = caller.call("get_status", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        assert_eq!(caller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending() {
        let (tx, mut rx) = mpsc::channel(8);
        let caller = Arc::new(WsApiCaller::new(tx, Duration::from_secs(5)));

        let waiting = {
            let caller = Arc::clone(&caller);
            tokio::spawn(async move { caller.call("get_status", json!({})).await })
        };
        rx.recv().await.unwrap();
        caller.on_disconnect();

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, ApiError::NotConnected));
    }

    #[tokio::test]
    async fn test_closed_channel_is_not_connected() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let caller = WsApiCaller::new(tx, Duration::from_secs(5));
        let err = caller.call("get_status", json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConnected));
    }

    #[test]
    fn test_unrelated_frames_are_not_consumed() {
        let (tx, _rx) = mpsc::channel(1);
        let caller = WsApiCaller::new(tx, Duration::from_secs(1));
        assert!(!caller.on_incoming_response(&json!({"post_type": "message"})));
        assert!(!caller.on_incoming_response(&json!({"echo": 999, "retcode": 0})));
    }
}
