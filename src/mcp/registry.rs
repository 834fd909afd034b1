//! Connection registry for tool servers
//!
//! [`ConnectionRegistry`] owns every live tool-server connection, keyed by
//! server id. It is constructed explicitly and shared behind an `Arc`.
//!
//! Reads take the map's read lock only long enough to clone the server
//! handle out; remote calls run without any registry lock held. Connects
//! for one id serialize on a per-id gate so concurrent callers never open
//! two transports for the same server.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::error::{relay_error, Result, RelayError};
use crate::mcp::naming::{check_server_id, QualifiedToolName, SEPARATOR};
use crate::mcp::server::{Connector, McpConnector, ToolServer, TransportConfig, TransportKind};
use crate::mcp::types::{GetPromptResponse, McpTool, Prompt, Resource, ResourceContents};

/// A live connection owned by the registry.
#[derive(Debug)]
pub struct ServerConnection {
    /// Server id.
    pub server_id: String,
    /// Parameters the connection was opened with.
    pub config: TransportConfig,
    /// Connected client handle.
    pub server: Arc<dyn ToolServer>,
    /// When the handshake completed.
    pub connected_at: DateTime<Utc>,
}

/// Read-only summary of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Server id.
    pub server_id: String,
    /// Transport family.
    pub transport: TransportKind,
    /// When the handshake completed.
    pub connected_at: DateTime<Utc>,
}

/// A tool tagged with the server that owns it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Owning server id.
    pub server_id: String,
    /// Tool name as the server knows it.
    pub name: String,
    /// Tool description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments.
    pub input_schema: Value,
}

impl ToolDescriptor {
    fn from_tool(server_id: &str, tool: McpTool) -> Self {
        Self {
            server_id: server_id.to_string(),
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }

    /// `"<server_id>__<tool_name>"`.
    pub fn qualified_name(&self) -> String {
        format!("{}{}{}", self.server_id, SEPARATOR, self.name)
    }
}

/// Registry of live tool-server connections.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use toolrelay::mcp::registry::ConnectionRegistry;
/// use toolrelay::mcp::server::TransportConfig;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let registry = Arc::new(ConnectionRegistry::default());
/// registry
///     .connect(
///         "files",
///         TransportConfig::Stdio {
///             command: "npx".into(),
///             args: vec!["-y".into(), "@modelcontextprotocol/server-filesystem".into()],
///             env: HashMap::new(),
///         },
///     )
///     .await?;
/// let tools = registry.get_all_tools().await;
/// registry.disconnect_all().await;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    connections: RwLock<HashMap<String, Arc<ServerConnection>>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(Arc::new(McpConnector::default()))
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry").finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Empty registry that opens connections through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Connect `server_id` unless it is already connected.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Config`] if the id or transport parameters are invalid.
    /// - [`RelayError::Connection`] if the transport or handshake fails.
    ///
    /// The registry is unchanged on error.
    pub async fn connect(&self, server_id: &str, config: TransportConfig) -> Result<()> {
        if self.is_connected(server_id).await {
            return Ok(());
        }

        check_server_id(server_id)
            .map_err(|e| RelayError::Config(format!("invalid server id: {e}")))?;
        config.validate()?;

        let gate = {
            let mut gates = self.gates.lock().await;
            Arc::clone(gates.entry(server_id.to_string()).or_default())
        };
        let result = {
            let _guard = gate.lock().await;
            self.connect_gated(server_id, config).await
        };

        // The last holder removes the gate, whatever the outcome. Clones are
        // only taken under the map lock, so the count cannot grow here.
        let mut gates = self.gates.lock().await;
        let last = gates
            .get(server_id)
            .is_some_and(|current| Arc::ptr_eq(current, &gate))
            && Arc::strong_count(&gate) == 2;
        drop(gate);
        if last {
            gates.remove(server_id);
        }

        result
    }

    async fn connect_gated(&self, server_id: &str, config: TransportConfig) -> Result<()> {
        if self.is_connected(server_id).await {
            return Ok(());
        }

        let server = self
            .connector
            .connect(server_id, &config)
            .await
            .map_err(|e| match relay_error(&e) {
                Some(RelayError::Config(_)) => e,
                _ => RelayError::Connection {
                    server: server_id.to_string(),
                    message: format!("{e:#}"),
                }
                .into(),
            })?;

        let connection = Arc::new(ServerConnection {
            server_id: server_id.to_string(),
            config,
            server,
            connected_at: Utc::now(),
        });
        self.connections
            .write()
            .await
            .insert(server_id.to_string(), connection);
        Ok(())
    }

    /// Close and remove `server_id`. Unknown ids are a no-op.
    ///
    /// The entry is removed even when closing the transport fails; the
    /// failure is logged.
    pub async fn disconnect(&self, server_id: &str) {
        let removed = self.connections.write().await.remove(server_id);
        let Some(connection) = removed else {
            return;
        };

        match connection.server.close().await {
            Ok(()) => tracing::info!(server = %server_id, "disconnected tool server"),
            Err(e) => tracing::warn!(server = %server_id, "error closing tool server: {e}"),
        }
    }

    /// Disconnect every server concurrently.
    pub async fn disconnect_all(&self) {
        let ids: Vec<String> = self.connections.read().await.keys().cloned().collect();
        futures::future::join_all(ids.iter().map(|id| self.disconnect(id))).await;
    }

    /// Whether `server_id` has a live connection.
    pub async fn is_connected(&self, server_id: &str) -> bool {
        self.connections.read().await.contains_key(server_id)
    }

    /// Summaries of every live connection, sorted by server id.
    pub async fn list_connections(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .connections
            .read()
            .await
            .values()
            .map(|c| ConnectionInfo {
                server_id: c.server_id.clone(),
                transport: c.config.kind(),
                connected_at: c.connected_at,
            })
            .collect();
        infos.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        infos
    }

    async fn server(&self, server_id: &str) -> Result<Arc<dyn ToolServer>> {
        self.connections
            .read()
            .await
            .get(server_id)
            .map(|c| Arc::clone(&c.server))
            .ok_or_else(|| RelayError::NotConnected(server_id.to_string()).into())
    }

    /// Tools exposed by `server_id`.
    pub async fn list_tools(&self, server_id: &str) -> Result<Vec<ToolDescriptor>> {
        let tools = self.server(server_id).await?.list_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| ToolDescriptor::from_tool(server_id, tool))
            .collect())
    }

    /// Prompts exposed by `server_id`.
    pub async fn list_prompts(&self, server_id: &str) -> Result<Vec<Prompt>> {
        self.server(server_id).await?.list_prompts().await
    }

    /// Resources exposed by `server_id`.
    pub async fn list_resources(&self, server_id: &str) -> Result<Vec<Resource>> {
        self.server(server_id).await?.list_resources().await
    }

    /// Invoke `tool_name` on `server_id`.
    ///
    /// # Errors
    ///
    /// [`RelayError::NotConnected`] for an unknown server, otherwise
    /// [`RelayError::ToolInvocation`].
    pub async fn call_tool(&self, server_id: &str, tool_name: &str, args: Value) -> Result<Value> {
        let server = self.server(server_id).await?;
        tracing::debug!(server = %server_id, tool = %tool_name, "calling tool");
        server.call_tool(tool_name, args).await.map_err(|e| {
            if relay_error(&e).is_some_and(|r| matches!(r, RelayError::ToolInvocation(_))) {
                e
            } else {
                RelayError::ToolInvocation(format!("{e:#}")).into()
            }
        })
    }

    /// Invoke a tool by its qualified name.
    pub async fn call_qualified(&self, name: &QualifiedToolName, args: Value) -> Result<Value> {
        self.call_tool(name.server_id(), name.tool_name(), args).await
    }

    /// Render a prompt on `server_id`.
    pub async fn get_prompt(
        &self,
        server_id: &str,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResponse> {
        self.server(server_id).await?.get_prompt(name, arguments).await
    }

    /// Read a resource from `server_id`.
    pub async fn read_resource(&self, server_id: &str, uri: &str) -> Result<Vec<ResourceContents>> {
        self.server(server_id).await?.read_resource(uri).await
    }

    /// Tools across every live connection, tagged with their server id.
    ///
    /// A server whose listing fails is logged and left out.
    pub async fn get_all_tools(&self) -> Vec<ToolDescriptor> {
        let mut servers: Vec<(String, Arc<dyn ToolServer>)> = self
            .connections
            .read()
            .await
            .values()
            .map(|c| (c.server_id.clone(), Arc::clone(&c.server)))
            .collect();
        servers.sort_by(|a, b| a.0.cmp(&b.0));

        let listings = futures::future::join_all(
            servers
                .iter()
                .map(|(id, server)| async move { (id, server.list_tools().await) }),
        )
        .await;

        let mut all = Vec::new();
        for (server_id, listing) in listings {
            match listing {
                Ok(tools) => all.extend(
                    tools
                        .into_iter()
                        .map(|tool| ToolDescriptor::from_tool(server_id, tool)),
                ),
                Err(e) => tracing::warn!(server = %server_id, "failed to list tools: {e}"),
            }
        }
        all
    }
}
