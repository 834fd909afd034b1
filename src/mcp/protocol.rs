//! Typed MCP lifecycle wrapper over [`JsonRpcClient`]
//!
//! This module provides two types that represent the two phases of an MCP
//! client session:
//!
//! - [`McpProtocol`] -- an uninitialized client. Call [`McpProtocol::initialize`]
//!   to perform the `initialize` / `notifications/initialized` handshake and
//!   receive an [`InitializedMcpProtocol`].
//! - [`InitializedMcpProtocol`] -- a negotiated session exposing the tool,
//!   prompt and resource methods as typed async calls.
//!
//! `list_tools`, `list_resources` and `list_prompts` follow `nextCursor`
//! until the server stops returning one.
//!
//! Neither type owns a transport; callers wire up channels externally and pass
//! the resulting [`JsonRpcClient`] into [`McpProtocol::new`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, RelayError};
use crate::mcp::client::JsonRpcClient;
use crate::mcp::types::{
    CallToolParams, CallToolResponse, ClientCapabilities, GetPromptParams, GetPromptResponse,
    Implementation, InitializeParams, InitializeResponse, ListPromptsResponse,
    ListResourcesResponse, ListToolsResponse, McpTool, PaginatedParams, Prompt,
    ReadResourceParams, ReadResourceResponse, Resource, ResourceContents,
    LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_PROMPTS_GET, METHOD_PROMPTS_LIST, METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, SUPPORTED_PROTOCOL_VERSIONS,
};

/// Identifies a capability a server may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCapabilityFlag {
    /// `tools/list` and `tools/call`.
    Tools,
    /// `resources/list` and `resources/read`.
    Resources,
    /// `prompts/list` and `prompts/get`.
    Prompts,
}

/// An uninitialized MCP client session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use toolrelay::mcp::client::JsonRpcClient;
/// use toolrelay::mcp::protocol::McpProtocol;
///
/// let (tx, _rx) = mpsc::unbounded_channel::<String>();
/// let client = Arc::new(JsonRpcClient::new("files", tx));
/// let _proto = McpProtocol::new(client);
/// ```
#[derive(Debug)]
pub struct McpProtocol {
    client: Arc<JsonRpcClient>,
}

impl McpProtocol {
    /// Wrap a channel-wired client whose read loop is already running.
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }

    /// Perform the MCP handshake.
    ///
    /// Sends `initialize`, verifies the server's chosen protocol version is
    /// in [`SUPPORTED_PROTOCOL_VERSIONS`], then sends
    /// `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::McpProtocolVersion`] for an unsupported
    /// version, and the client's transport, timeout or JSON-RPC errors
    /// otherwise.
    pub async fn initialize(
        self,
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<InitializedMcpProtocol> {
        let response: InitializeResponse = self
            .client
            .request(
                METHOD_INITIALIZE,
                InitializeParams {
                    protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                    capabilities,
                    client_info,
                },
                None,
            )
            .await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(RelayError::McpProtocolVersion {
                expected: SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                got: response.protocol_version,
            }
            .into());
        }

        self.client
            .notify(METHOD_INITIALIZED, serde_json::json!({}))?;

        tracing::debug!(
            server = self.client.server(),
            remote = %response.server_info.name,
            version = %response.protocol_version,
            "MCP handshake complete"
        );

        Ok(InitializedMcpProtocol {
            client: self.client,
            initialize_response: response,
        })
    }
}

/// A negotiated MCP client session.
#[derive(Debug)]
pub struct InitializedMcpProtocol {
    client: Arc<JsonRpcClient>,
    /// The server's response to the `initialize` request.
    pub initialize_response: InitializeResponse,
}

impl InitializedMcpProtocol {
    /// Whether the server advertised `capability` during the handshake.
    pub fn capable(&self, capability: ServerCapabilityFlag) -> bool {
        let caps = &self.initialize_response.capabilities;
        match capability {
            ServerCapabilityFlag::Tools => caps.tools.is_some(),
            ServerCapabilityFlag::Resources => caps.resources.is_some(),
            ServerCapabilityFlag::Prompts => caps.prompts.is_some(),
        }
    }

    /// List every tool, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let resp: ListToolsResponse = self
                .client
                .request(METHOD_TOOLS_LIST, PaginatedParams { cursor }, None)
                .await?;

            tools.extend(resp.tools);

            match resp.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a named tool.
    ///
    /// A response with `isError: true` is returned as-is; interpreting it is
    /// the caller's job.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResponse> {
        self.client
            .request(
                METHOD_TOOLS_CALL,
                CallToolParams {
                    name: name.to_string(),
                    arguments,
                },
                None,
            )
            .await
    }

    /// List every resource, following pagination.
    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let resp: ListResourcesResponse = self
                .client
                .request(METHOD_RESOURCES_LIST, PaginatedParams { cursor }, None)
                .await?;

            resources.extend(resp.resources);

            match resp.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(resources)
    }

    /// Read the contents of a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let resp: ReadResourceResponse = self
            .client
            .request(
                METHOD_RESOURCES_READ,
                ReadResourceParams {
                    uri: uri.to_string(),
                },
                None,
            )
            .await?;
        Ok(resp.contents)
    }

    /// List every prompt, following pagination.
    pub async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        let mut prompts = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let resp: ListPromptsResponse = self
                .client
                .request(METHOD_PROMPTS_LIST, PaginatedParams { cursor }, None)
                .await?;

            prompts.extend(resp.prompts);

            match resp.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(prompts)
    }

    /// Render a prompt with optional string arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResponse> {
        self.client
            .request(
                METHOD_PROMPTS_GET,
                GetPromptParams {
                    name: name.to_string(),
                    arguments,
                },
                None,
            )
            .await
    }
}
