//! Server-Sent Events parsing and the legacy HTTP+SSE transport
//!
//! [`SseParser`] is an incremental event-stream parser shared by both HTTP
//! transports. It only decodes complete lines, so a chunk boundary that
//! splits a multi-byte character is harmless.
//!
//! [`SseTransport`] implements the older two-endpoint MCP transport: the
//! client opens a long-lived `GET` event stream, the server announces a
//! message endpoint in an `endpoint` event, and every outbound message is
//! POSTed there. Responses arrive as `message` events on the GET stream.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Result, RelayError};
use crate::mcp::transport::Transport;

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field; `None` means the default `message` type.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// `id:` field, if present.
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type with the default applied.
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    /// True for keep-alive events that carry no JSON-RPC message.
    pub fn is_ping(&self) -> bool {
        self.kind().eq_ignore_ascii_case("ping") || self.data.eq_ignore_ascii_case("[ping]")
    }
}

/// Incremental SSE parser.
///
/// # Examples
///
/// ```
/// use toolrelay::mcp::transport::sse::SseParser;
///
/// let mut parser = SseParser::default();
/// assert!(parser.push(b"data: {\"a\"").is_empty());
/// let events = parser.push(b":1}\n\n");
/// assert_eq!(events[0].data, "{\"a\":1}");
/// ```
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    /// Feed a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            let line = String::from_utf8_lossy(&line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Dispatch whatever is pending when the stream ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() && self.event.is_none() {
            self.id = None;
            return None;
        }
        let event = SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        };
        Some(event)
    }
}

/// Legacy HTTP+SSE transport.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use toolrelay::mcp::transport::sse::SseTransport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let url = url::Url::parse("http://localhost:3001/sse")?;
/// let transport = SseTransport::connect(url, Duration::from_secs(30)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SseTransport {
    http_client: reqwest::Client,
    /// Message endpoint announced by the server.
    endpoint: Url,
    request_timeout: Duration,
    response_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    error_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    cancel: CancellationToken,
}

impl SseTransport {
    /// Open the event stream at `url` and wait for the `endpoint` event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::McpTransport`] if the GET fails, returns a
    /// non-success status, or no endpoint is announced within `timeout`.
    pub async fn connect(url: Url, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RelayError::McpTransport(format!("failed to build HTTP client: {e}")))?;

        let response = http_client
            .get(url.as_str())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| RelayError::McpTransport(format!("SSE GET failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                RelayError::McpTransport(format!("SSE GET returned HTTP {status}")).into(),
            );
        }

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<Url>();
        let cancel = CancellationToken::new();

        let reader_cancel = cancel.clone();
        let base = url.clone();
        tokio::spawn(async move {
            let byte_stream = response.bytes_stream();
            tokio::pin!(byte_stream);
            let mut parser = SseParser::default();
            let mut endpoint_tx = Some(endpoint_tx);
            loop {
                let chunk = tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    chunk = byte_stream.next() => chunk,
                };
                let (events, done) = match chunk {
                    Some(Ok(bytes)) => (parser.push(&bytes), false),
                    Some(Err(e)) => {
                        let _ = error_tx.send(format!("SSE stream error: {e}"));
                        (parser.finish().into_iter().collect(), true)
                    }
                    None => (parser.finish().into_iter().collect::<Vec<_>>(), true),
                };

                for event in events {
                    if event.kind() == "endpoint" {
                        match base.join(event.data.trim()) {
                            Ok(endpoint) => {
                                if let Some(tx) = endpoint_tx.take() {
                                    let _ = tx.send(endpoint);
                                }
                            }
                            Err(e) => {
                                let _ = error_tx.send(format!("invalid endpoint event: {e}"));
                            }
                        }
                    } else if event.kind() == "message"
                        && !event.is_ping()
                        && response_tx.send(event.data).is_err()
                    {
                        return;
                    }
                }

                if done {
                    break;
                }
            }
            tracing::debug!(url = %base, "SSE event stream closed");
        });

        let endpoint = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                cancel.cancel();
                return Err(RelayError::McpTransport(
                    "SSE stream closed before an endpoint was announced".into(),
                )
                .into());
            }
            Err(_) => {
                cancel.cancel();
                return Err(RelayError::McpTransport(
                    "timed out waiting for SSE endpoint event".into(),
                )
                .into());
            }
        };

        tracing::debug!(%endpoint, "SSE message endpoint announced");

        Ok(Self {
            http_client,
            endpoint,
            request_timeout: timeout,
            response_rx: Arc::new(Mutex::new(response_rx)),
            error_rx: Arc::new(Mutex::new(error_rx)),
            cancel,
        })
    }

    /// Message endpoint announced by the server.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
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

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn send(&self, message: String) -> Result<()> {
        let response = self
            .http_client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .body(message)
            .send()
            .await
            .map_err(|e| RelayError::McpTransport(format!("SSE POST failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                RelayError::McpTransport(format!("SSE POST returned HTTP {status}")).into(),
            );
        }
        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.response_rx))
    }

    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.error_rx))
    }

    async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
