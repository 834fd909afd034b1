//! Command handlers for the CLI
//!
//! This module provides command handlers invoked by the CLI entrypoint:
//!
//! - `chat`    -- send one message and stream the encoded reply to stdout
//! - `tools`   -- list qualified tool names across configured servers
//! - `servers` -- list, export and import server records

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::mcp::records::ServerRecord;
use crate::mcp::server::McpConnector;
use crate::mcp::ConnectionRegistry;

pub mod chat;
pub mod servers;
pub mod tools;

/// Registry using the configured request timeout
pub fn build_registry(config: &Config) -> Arc<ConnectionRegistry> {
    Arc::new(ConnectionRegistry::new(Arc::new(McpConnector::new(
        config.mcp.request_timeout(),
    ))))
}

/// Connect every record concurrently.
///
/// Failures are logged and returned keyed by server id; they never stop the
/// other connections.
pub async fn connect_servers(
    registry: &ConnectionRegistry,
    servers: &[ServerRecord],
) -> HashMap<String, String> {
    let attempts = servers.iter().map(|record| async move {
        let result = match record.transport_config() {
            Ok(transport) => registry.connect(&record.id, transport).await,
            Err(e) => Err(e),
        };
        (record.id.clone(), result)
    });

    futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(server = %id, "Failed to connect: {:#}", e);
                Some((id, format!("{:#}", e)))
            }
        })
        .collect()
}
