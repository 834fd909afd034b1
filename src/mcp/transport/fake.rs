//! In-process fake transport for unit tests
//!
//! [`FakeTransport::new`] returns a `(FakeTransport, FakeTransportHandle)`
//! pair. The test reads what the client sent from `handle.outbound_rx` and
//! injects server messages through `handle.inbound_tx`:
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx -----------------> inbound_rx  (client receive())
//! ```
//!
//! [`FakeTransport::scripted`] instead answers every request through a
//! responder closure, which is enough to stand up a complete fake tool
//! server for session and registry tests.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::error::{Result, RelayError};
use crate::mcp::transport::Transport;

/// Responder used by [`FakeTransport::scripted`]: maps `(method, params)` to
/// a `result` value or a JSON-RPC error message.
pub type Responder =
    Arc<dyn Fn(&str, &Value) -> std::result::Result<Value, String> + Send + Sync>;

/// In-process fake transport.
pub struct FakeTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    inbound_inject_tx: mpsc::UnboundedSender<String>,
    responder: Option<Responder>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransport")
            .field("scripted", &self.responder.is_some())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Test-side half of a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Messages the client sent.
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Push messages the client should receive.
    pub inbound_tx: mpsc::UnboundedSender<String>,
    /// Set once the client closes the transport.
    pub closed: Arc<AtomicBool>,
}

impl FakeTransport {
    /// Create a manually driven transport and its handle.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let closed = Arc::new(AtomicBool::new(false));

        let transport = Self {
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            inbound_inject_tx: inbound_tx.clone(),
            responder: None,
            closed: Arc::clone(&closed),
        };

        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
            closed,
        };

        (transport, handle)
    }

    /// Create a transport that answers every request with `responder`.
    ///
    /// Notifications are swallowed. The returned flag reports whether the
    /// transport was closed.
    pub fn scripted<F>(responder: F) -> (Self, Arc<AtomicBool>)
    where
        F: Fn(&str, &Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let (mut transport, handle) = Self::new();
        transport.responder = Some(Arc::new(responder));
        (transport, handle.closed)
    }

    /// Push a server message onto the inbound channel.
    pub fn inject_response(&self, response: Value) {
        let _ = self.inbound_inject_tx.send(response.to_string());
    }
}

/// A responder that behaves like a well-formed server exposing `tools`.
///
/// `tools/call` echoes its arguments back as text content, except for a
/// tool named `fail`, which reports `isError`.
pub fn tool_server_responder(
    tools: Vec<&'static str>,
) -> impl Fn(&str, &Value) -> std::result::Result<Value, String> + Send + Sync + 'static {
    move |method, params| match method {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": "2025-06-18",
            "capabilities": { "tools": {}, "prompts": {}, "resources": {} },
            "serverInfo": { "name": "fake", "version": "0.0.1" }
        })),
        "tools/list" => Ok(serde_json::json!({
            "tools": tools
                .iter()
                .map(|name| serde_json::json!({
                    "name": name,
                    "description": format!("fake tool {name}"),
                    "inputSchema": { "type": "object" }
                }))
                .collect::<Vec<_>>()
        })),
        "tools/call" => {
            let name = params["name"].as_str().unwrap_or_default();
            if name == "fail" {
                Ok(serde_json::json!({
                    "content": [{ "type": "text", "text": "tool exploded" }],
                    "isError": true
                }))
            } else {
                Ok(serde_json::json!({
                    "content": [{ "type": "text", "text": params["arguments"].to_string() }]
                }))
            }
        }
        "prompts/list" => Ok(serde_json::json!({ "prompts": [{ "name": "greet" }] })),
        "prompts/get" => Ok(serde_json::json!({
            "description": "greeting",
            "messages": [{ "role": "user", "content": { "type": "text", "text": "hi" } }]
        })),
        "resources/list" => Ok(serde_json::json!({
            "resources": [{ "uri": "mem://a", "name": "a" }]
        })),
        "resources/read" => Ok(serde_json::json!({
            "contents": [{ "uri": params["uri"], "text": "contents of a" }]
        })),
        "ping" => Ok(serde_json::json!({})),
        other => Err(format!("Method not found: {other}")),
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::McpTransport("fake transport closed".into()).into());
        }

        if let Some(responder) = &self.responder {
            let value: Value = serde_json::from_str(&message)?;
            let (Some(id), Some(method)) = (value.get("id"), value["method"].as_str()) else {
                return Ok(());
            };
            let params = value.get("params").cloned().unwrap_or(Value::Null);
            let reply = match responder(method, &params) {
                Ok(result) => serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Err(message) => serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": message }
                }),
            };
            self.inject_response(reply);
            return Ok(());
        }

        self.outbound_tx
            .send(message)
            .map_err(|_| RelayError::McpTransport("fake outbound channel closed".into()).into())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.inbound_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        Box::pin(futures::stream::empty())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_manual_round_trip() {
        let (transport, mut handle) = FakeTransport::new();
        transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string())
            .await
            .unwrap();
        assert!(handle.outbound_rx.recv().await.unwrap().contains("ping"));

        handle
            .inbound_tx
            .send(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#.to_string())
            .unwrap();
        let received = transport.receive().next().await.unwrap();
        assert!(received.contains("result"));
    }

    #[tokio::test]
    async fn test_scripted_answers_requests() {
        let (transport, _closed) = FakeTransport::scripted(tool_server_responder(vec!["echo"]));
        transport
            .send(r#"{"jsonrpc":"2.0","id":4,"method":"tools/list","params":{}}"#.to_string())
            .await
            .unwrap();
        let raw = transport.receive().next().await.unwrap();
        let reply: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, closed) = FakeTransport::scripted(tool_server_responder(vec![]));
        transport.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
        assert!(transport.send("{}".to_string()).await.is_err());
    }
}
