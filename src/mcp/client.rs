//! Transport-agnostic async JSON-RPC 2.0 client
//!
//! This module provides [`JsonRpcClient`], a channel-backed JSON-RPC 2.0 client
//! that is completely decoupled from the underlying transport. Callers wire up
//! two [`tokio::sync::mpsc`] channels (one for outbound serialized messages, one
//! for inbound serialized messages) and then call [`start_read_loop`] to
//! process responses concurrently.
//!
//! # Design
//!
//! - Outbound messages are written to `outbound_tx` as single JSON strings.
//!   Framing is the transport's job.
//! - Inbound messages arrive on `inbound_rx`. The read loop resolves
//!   responses, rejects server-initiated requests with `-32601` (the relay
//!   advertises no client capabilities) and logs notifications.
//! - In-flight requests are tracked in a `pending` map keyed by `u64` request
//!   ID. Each entry is a `oneshot::Sender` for the `result` or `error` value.
//! - A [`CancellationToken`] stops the read loop and drops all pending
//!   senders so that awaiting callers receive an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RelayError};
use crate::mcp::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Default timeout applied to every request when the caller does not specify one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The pending-response map type: maps request ID to the oneshot sender.
type PendingMap =
    HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, JsonRpcError>>>;

/// Transport-agnostic async JSON-RPC 2.0 client.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use toolrelay::mcp::client::{JsonRpcClient, start_read_loop};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let (out_tx, _out_rx) = mpsc::unbounded_channel::<String>();
///     let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
///     let token = CancellationToken::new();
///     let client = Arc::new(JsonRpcClient::new("files", out_tx));
///     let _handle = start_read_loop(in_rx, token, Arc::clone(&client));
///     Ok(())
/// }
/// ```
pub struct JsonRpcClient {
    /// Server label used in timeout errors and log lines.
    server: String,
    /// Monotonically increasing request ID counter.
    next_id: AtomicU64,
    /// In-flight requests waiting for a response.
    pending: Mutex<PendingMap>,
    /// Channel used to send serialized JSON-RPC messages to the transport.
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Timeout applied when a request does not specify its own.
    default_timeout: Duration,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("server", &self.server)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a new `JsonRpcClient` for the server labelled `server`.
    ///
    /// The caller is responsible for wiring the receiving half of
    /// `outbound_tx` to a transport writer and for calling
    /// [`start_read_loop`] with the inbound receiver.
    pub fn new(server: impl Into<String>, outbound_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            server: server.into(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbound_tx,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the timeout used when `request` is called without one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Server label this client was created for.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::McpTransport`] if the outbound channel is closed
    /// or the read loop exits first, [`RelayError::McpTimeout`] if no
    /// response arrives in time, [`RelayError::Mcp`] for a JSON-RPC error
    /// response and [`RelayError::Serialization`] if the result does not
    /// deserialize into `R`.
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register the pending slot before sending so the response can never
        // arrive before we are ready to receive it.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        if self.outbound_tx.send(message).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(RelayError::McpTransport("outbound channel closed".to_string()).into());
        }

        let deadline = timeout.unwrap_or(self.default_timeout);
        let outcome = match tokio::time::timeout(deadline, rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(RelayError::McpTimeout {
                    server: self.server.clone(),
                    method: method.to_string(),
                }
                .into());
            }
        };

        // The oneshot was dropped (read loop exited) before a response arrived.
        let rpc_result = outcome.map_err(|_| {
            RelayError::McpTransport("read loop exited before response arrived".to_string())
        })?;

        let value = rpc_result.map_err(|e| RelayError::Mcp(e.message))?;

        serde_json::from_value(value).map_err(|e| RelayError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::McpTransport`] if the outbound channel is closed.
    pub fn notify<P: serde::Serialize + Send>(&self, method: &str, params: P) -> Result<()> {
        let message = serde_json::to_string(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": serde_json::to_value(params)?
        }))?;

        self.outbound_tx
            .send(message)
            .map_err(|_| RelayError::McpTransport("outbound channel closed".to_string()))?;

        Ok(())
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// The loop reads serialized JSON strings from `inbound_rx`, classifies each
/// message and dispatches it:
///
/// - **Response** (has `"id"` and `"result"` or `"error"`): resolves the
///   matching pending sender.
/// - **Server-initiated request** (has `"id"` and `"method"`): answered with
///   `-32601 Method not found`, except `ping`, which gets an empty result.
/// - **Notification** (has `"method"` but no `"id"`): logged at debug level.
///
/// When `cancellation` fires or the inbound channel closes, all pending
/// senders are dropped so in-flight `request()` calls fail fast.
pub fn start_read_loop(
    mut inbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
    client: Arc<JsonRpcClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = inbound_rx.recv() => match maybe_msg {
                    Some(raw) => dispatch_message(&raw, &client).await,
                    None => break,
                },
            }
        }
        client.pending.lock().await.clear();
        tracing::debug!(server = %client.server, "MCP read loop stopped");
    })
}

/// Classify and dispatch a single inbound JSON string.
async fn dispatch_message(raw: &str, client: &JsonRpcClient) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(server = %client.server, "MCP read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").is_some_and(|id| !id.is_null());
    let has_method = value.get("method").is_some();
    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();

    if has_id && (has_result || has_error) && !has_method {
        handle_response(value, client).await;
    } else if has_id && has_method {
        handle_server_request(value, client);
    } else if has_method {
        tracing::debug!(
            server = %client.server,
            method = value["method"].as_str().unwrap_or(""),
            "MCP notification received"
        );
    } else {
        tracing::debug!(server = %client.server, "MCP read loop: unclassifiable message ignored");
    }
}

/// Resolve a pending request sender with the response value or error.
async fn handle_response(value: serde_json::Value, client: &JsonRpcClient) {
    let id_val = &value["id"];
    let id = match id_val
        .as_u64()
        .or_else(|| id_val.as_str().and_then(|s| s.parse::<u64>().ok()))
    {
        Some(id) => id,
        None => {
            tracing::warn!(server = %client.server, "MCP read loop: response has non-integer id: {id_val}");
            return;
        }
    };

    let Some(tx) = client.pending.lock().await.remove(&id) else {
        tracing::debug!(server = %client.server, "MCP read loop: response for unknown id {id}");
        return;
    };

    let outcome = match value.get("error") {
        Some(error_val) => Err(serde_json::from_value::<JsonRpcError>(error_val.clone())
            .unwrap_or_else(|_| JsonRpcError {
                code: -32603,
                message: format!("malformed error object: {error_val}"),
                data: None,
            })),
        None => Ok(value
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null)),
    };

    // The caller may have already timed out.
    let _ = tx.send(outcome);
}

/// Answer a server-initiated request.
fn handle_server_request(value: serde_json::Value, client: &JsonRpcClient) {
    let method = value
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    let id = value.get("id").cloned();

    let response = if method == "ping" {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(serde_json::json!({})),
            error: None,
        }
    } else {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {method}"),
                data: None,
            }),
        }
    };

    if let Ok(serialized) = serde_json::to_string(&response) {
        let _ = client.outbound_tx.send(serialized);
    }
}
