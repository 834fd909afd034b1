//! Streamable HTTP transport
//!
//! [`HttpTransport`] sends every outbound JSON-RPC message as an HTTP POST.
//! The server may reply with:
//!
//! - `application/json` -- a direct JSON response body
//! - `text/event-stream` -- an SSE stream carrying one or more messages
//! - `202 Accepted` -- an acknowledgement with no body (notifications)
//!
//! Requests are posted from a background task so that concurrent tool calls
//! against one server do not queue behind each other. If such a POST fails,
//! the transport injects a JSON-RPC error response for the request id so the
//! waiting caller fails immediately instead of timing out. Notifications are
//! posted inline, which keeps them ordered ahead of later requests.
//!
//! # Session management
//!
//! An `Mcp-Session-Id` response header is stored and attached to every later
//! POST. A `404` while a session is active clears it. [`Transport::close`]
//! (or drop) issues a DELETE to terminate the session.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use url::Url;

use crate::error::{Result, RelayError};
use crate::mcp::transport::sse::SseParser;
use crate::mcp::transport::Transport;
use crate::mcp::types::LATEST_PROTOCOL_VERSION;

const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Streamable HTTP transport.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use toolrelay::mcp::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new(
///     url::Url::parse("http://localhost:3000/mcp").unwrap(),
///     Duration::from_secs(30),
/// );
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    inner: Arc<Inner>,
    response_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    error_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

#[derive(Debug)]
struct Inner {
    http_client: reqwest::Client,
    endpoint: Url,
    session_id: RwLock<Option<String>>,
    response_tx: mpsc::UnboundedSender<String>,
    error_tx: mpsc::UnboundedSender<String>,
}

impl HttpTransport {
    /// Construct a transport targeting `endpoint`. No I/O is performed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::McpTransport`] if the HTTP client cannot be
    /// built (TLS backend initialisation failure).
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::McpTransport(format!("failed to build HTTP client: {e}")))?;

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(Inner {
                http_client,
                endpoint,
                session_id: RwLock::new(None),
                response_tx,
                error_tx,
            }),
            response_rx: Arc::new(Mutex::new(response_rx)),
            error_rx: Arc::new(Mutex::new(error_rx)),
        })
    }

    /// Current session id, if the server assigned one.
    pub async fn session_id(&self) -> Option<String> {
        self.inner.session_id.read().await.clone()
    }
}

impl Inner {
    /// POST one message and route whatever comes back into `response_tx`.
    async fn post(&self, message: String) -> Result<()> {
        let mut req = self
            .http_client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", LATEST_PROTOCOL_VERSION)
            .body(message);

        if let Some(id) = self.session_id.read().await.as_deref() {
            req = req.header(SESSION_HEADER, id);
        }

        let response = req
            .send()
            .await
            .map_err(|e| RelayError::McpTransport(format!("HTTP POST failed: {e}")))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            let mut sid = self.session_id.write().await;
            if sid.take().is_some() {
                return Err(RelayError::Mcp("mcp session expired".into()).into());
            }
            return Err(RelayError::McpTransport("HTTP 404 Not Found".into()).into());
        }

        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        if !status.is_success() {
            return Err(
                RelayError::McpTransport(format!("HTTP POST returned status {status}")).into(),
            );
        }

        if let Some(new_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut sid = self.session_id.write().await;
            if sid.is_none() {
                *sid = Some(new_id.to_string());
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            let mut parser = SseParser::default();
            let mut byte_stream = response.bytes_stream();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk
                    .map_err(|e| RelayError::McpTransport(format!("SSE body error: {e}")))?;
                for event in parser.push(&chunk) {
                    self.forward(event);
                }
            }
            if let Some(event) = parser.finish() {
                self.forward(event);
            }
        } else {
            let body = response.text().await.map_err(|e| {
                RelayError::McpTransport(format!("failed to read response body: {e}"))
            })?;
            if !body.trim().is_empty() {
                let _ = self.response_tx.send(body);
            }
        }

        Ok(())
    }

    fn forward(&self, event: crate::mcp::transport::sse::SseEvent) {
        if event.kind() == "message" && !event.is_ping() && !event.data.is_empty() {
            let _ = self.response_tx.send(event.data);
        }
    }

    /// Synthesize a JSON-RPC error reply for a request whose POST failed.
    fn fail_request(&self, id: serde_json::Value, err: &anyhow::Error) {
        let reply = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32000, "message": err.to_string() }
        });
        let _ = self.response_tx.send(reply.to_string());
        let _ = self.error_tx.send(err.to_string());
    }
}

fn channel_stream(
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
) -> Pin<Box<dyn Stream<Item = String> + Send + 'static>> {
    Box::pin(futures::stream::unfold(rx, |rx| async move {
        let mut guard = rx.lock().await;
        let item = guard.recv().await?;
        drop(guard);
        Some((item, rx))
    }))
}

/// Request id of a serialized request, or `None` for notifications and
/// responses.
fn request_id(message: &str) -> Option<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(message).ok()?;
    value.get("method")?;
    value.get("id").filter(|id| !id.is_null()).cloned()
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: String) -> Result<()> {
        match request_id(&message) {
            Some(id) => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    if let Err(e) = inner.post(message).await {
                        tracing::debug!(endpoint = %inner.endpoint, "request POST failed: {e}");
                        inner.fail_request(id, &e);
                    }
                });
                Ok(())
            }
            None => self.inner.post(message).await,
        }
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.response_rx))
    }

    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.error_rx))
    }

    async fn close(&self) -> Result<()> {
        let Some(sid) = self.inner.session_id.write().await.take() else {
            return Ok(());
        };
        let result = self
            .inner
            .http_client
            .delete(self.inner.endpoint.as_str())
            .header(SESSION_HEADER, sid)
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!("session DELETE failed: {e}");
        }
        Ok(())
    }
}

impl Drop for HttpTransport {
    /// Best-effort session termination when `close` was never called.
    fn drop(&mut self) {
        let session_id = match self.inner.session_id.try_read() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };

        if let Some(sid) = session_id {
            let endpoint = self.inner.endpoint.to_string();
            // Blocking client on its own thread; drop may run inside the runtime.
            let _ = std::thread::spawn(move || {
                if let Ok(client) = reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(5))
                    .build()
                {
                    let _ = client.delete(&endpoint).header(SESSION_HEADER, sid).send();
                }
            });
        }
    }
}
