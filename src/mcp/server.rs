//! Live tool-server sessions
//!
//! [`TransportConfig`] describes how to reach a server. A [`Connector`]
//! turns a config into a live [`ToolServer`]; the production connector,
//! [`McpConnector`], builds the matching [`Transport`], wires it to a
//! [`JsonRpcClient`] and performs the MCP handshake, producing an
//! [`McpSession`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RelayError};
use crate::mcp::client::{start_read_loop, JsonRpcClient, DEFAULT_REQUEST_TIMEOUT};
use crate::mcp::protocol::{InitializedMcpProtocol, McpProtocol};
use crate::mcp::transport::http::HttpTransport;
use crate::mcp::transport::sse::SseTransport;
use crate::mcp::transport::stdio::StdioTransport;
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    ClientCapabilities, GetPromptResponse, Implementation, McpTool, Prompt, Resource,
    ResourceContents,
};

/// Transport family of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Child process speaking newline-delimited JSON.
    Stdio,
    /// Legacy HTTP+SSE.
    Sse,
    /// Streamable HTTP.
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Sse => "sse",
            TransportKind::Http => "http",
        })
    }
}

/// Transport parameters for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Spawn `command args...` with `env` layered over the inherited environment.
    Stdio {
        /// Executable.
        command: String,
        /// Arguments.
        args: Vec<String>,
        /// Extra environment variables.
        env: HashMap<String, String>,
    },
    /// Legacy HTTP+SSE event-stream URL.
    Sse {
        /// Event-stream URL.
        url: String,
    },
    /// Streamable HTTP endpoint URL.
    Http {
        /// Endpoint URL.
        url: String,
    },
}

impl TransportConfig {
    /// Transport family.
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Stdio { .. } => TransportKind::Stdio,
            TransportConfig::Sse { .. } => TransportKind::Sse,
            TransportConfig::Http { .. } => TransportKind::Http,
        }
    }

    /// Check the transport-specific required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when stdio lacks a command or sse/http
    /// lack a parseable URL.
    pub fn validate(&self) -> Result<()> {
        match self {
            TransportConfig::Stdio { command, .. } => {
                if command.trim().is_empty() {
                    return Err(
                        RelayError::Config("stdio transport requires a command".into()).into(),
                    );
                }
            }
            TransportConfig::Sse { url } | TransportConfig::Http { url } => {
                parse_url(self.kind(), url)?;
            }
        }
        Ok(())
    }
}

fn parse_url(kind: TransportKind, url: &str) -> Result<url::Url> {
    if url.trim().is_empty() {
        return Err(RelayError::Config(format!("{kind} transport requires a URL")).into());
    }
    url::Url::parse(url)
        .map_err(|e| RelayError::Config(format!("invalid {kind} URL '{url}': {e}")).into())
}

/// Capabilities of one connected tool server.
#[async_trait::async_trait]
pub trait ToolServer: Send + Sync + fmt::Debug {
    /// Tools the server exposes.
    async fn list_tools(&self) -> Result<Vec<McpTool>>;

    /// Prompts the server exposes.
    async fn list_prompts(&self) -> Result<Vec<Prompt>>;

    /// Resources the server exposes.
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// Invoke `name` and return its structured content, or its content array
    /// when no structured content was produced.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ToolInvocation`] when the call fails or the
    /// tool reports `isError`.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;

    /// Render a prompt.
    async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResponse>;

    /// Read a resource.
    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>>;

    /// Tear down the connection and release transport resources.
    async fn close(&self) -> Result<()>;
}

/// Creates live [`ToolServer`]s from transport configs.
///
/// The registry depends on this seam rather than on concrete transports.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection and complete the handshake.
    async fn connect(&self, server_id: &str, config: &TransportConfig)
        -> Result<Arc<dyn ToolServer>>;
}

/// An initialized MCP session over some [`Transport`].
pub struct McpSession {
    server_id: String,
    transport: Arc<dyn Transport>,
    protocol: InitializedMcpProtocol,
    cancel: CancellationToken,
}

impl fmt::Debug for McpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpSession")
            .field("server_id", &self.server_id)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl McpSession {
    /// Wire `transport` to a JSON-RPC client and run the handshake.
    ///
    /// On failure the background tasks are cancelled and the transport is
    /// closed before the error is returned.
    pub async fn start(
        server_id: &str,
        transport: Arc<dyn Transport>,
        client_info: Implementation,
        request_timeout: Duration,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        // client -> transport
        {
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            let server = server_id.to_string();
            tokio::spawn(async move {
                loop {
                    let message = tokio::select! {
                        _ = cancel.cancelled() => break,
                        message = out_rx.recv() => match message {
                            Some(message) => message,
                            None => break,
                        },
                    };
                    if let Err(e) = transport.send(message).await {
                        tracing::warn!(server = %server, "failed to send MCP message: {e}");
                    }
                }
            });
        }

        // transport -> client
        {
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            let server = server_id.to_string();
            tokio::spawn(async move {
                let mut inbound = transport.receive();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        message = inbound.next() => match message {
                            Some(message) => {
                                if in_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            None => {
                                tracing::debug!(server = %server, "transport closed its inbound stream");
                                break;
                            }
                        },
                    }
                }
            });
        }

        // diagnostics
        {
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            let server = server_id.to_string();
            tokio::spawn(async move {
                let mut diagnostics = transport.receive_err();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        line = diagnostics.next() => match line {
                            Some(line) => tracing::trace!(server = %server, "{line}"),
                            None => break,
                        },
                    }
                }
            });
        }

        let client = Arc::new(
            JsonRpcClient::new(server_id, out_tx).with_default_timeout(request_timeout),
        );
        start_read_loop(in_rx, cancel.clone(), Arc::clone(&client));

        let protocol = match McpProtocol::new(client)
            .initialize(client_info, ClientCapabilities::default())
            .await
        {
            Ok(protocol) => protocol,
            Err(e) => {
                cancel.cancel();
                if let Err(close_err) = transport.close().await {
                    tracing::debug!(server = %server_id, "close after failed handshake: {close_err}");
                }
                return Err(e);
            }
        };

        Ok(Self {
            server_id: server_id.to_string(),
            transport,
            protocol,
            cancel,
        })
    }

    /// Server id this session belongs to.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Name the server reported during the handshake.
    pub fn remote_name(&self) -> &str {
        &self.protocol.initialize_response.server_info.name
    }
}

#[async_trait::async_trait]
impl ToolServer for McpSession {
    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.protocol.list_tools().await
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.protocol.list_prompts().await
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        self.protocol.list_resources().await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let arguments = match arguments {
            Value::Null => None,
            other => Some(other),
        };
        let response = self
            .protocol
            .call_tool(name, arguments)
            .await
            .map_err(|e| RelayError::ToolInvocation(format!("{name}: {e}")))?;

        if response.is_error.unwrap_or(false) {
            let text = response.text();
            let message = if text.is_empty() {
                format!("tool {name} reported an error")
            } else {
                text
            };
            return Err(RelayError::ToolInvocation(message).into());
        }

        Ok(response.into_value())
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResponse> {
        self.protocol.get_prompt(name, arguments).await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        self.protocol.read_resource(uri).await
    }

    async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        self.transport.close().await
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Production [`Connector`] that speaks MCP over real transports.
#[derive(Debug, Clone)]
pub struct McpConnector {
    request_timeout: Duration,
    client_info: Implementation,
}

impl Default for McpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl McpConnector {
    /// Connector using `request_timeout` for every JSON-RPC request.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    async fn open_transport(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        let transport: Arc<dyn Transport> = match config {
            TransportConfig::Stdio { command, args, env } => {
                Arc::new(StdioTransport::spawn(command, args, env)?)
            }
            TransportConfig::Sse { url } => Arc::new(
                SseTransport::connect(parse_url(TransportKind::Sse, url)?, self.request_timeout)
                    .await?,
            ),
            TransportConfig::Http { url } => Arc::new(HttpTransport::new(
                parse_url(TransportKind::Http, url)?,
                self.request_timeout,
            )?),
        };
        Ok(transport)
    }
}

#[async_trait::async_trait]
impl Connector for McpConnector {
    async fn connect(
        &self,
        server_id: &str,
        config: &TransportConfig,
    ) -> Result<Arc<dyn ToolServer>> {
        let transport = self.open_transport(config).await?;
        let session = McpSession::start(
            server_id,
            transport,
            self.client_info.clone(),
            self.request_timeout,
        )
        .await?;
        tracing::info!(
            server = %server_id,
            transport = %config.kind(),
            remote = %session.remote_name(),
            "connected to tool server"
        );
        Ok(Arc::new(session))
    }
}
