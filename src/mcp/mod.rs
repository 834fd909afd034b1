//! Tool-server (MCP) client support
//!
//! # Module Layout
//!
//! - `types`     -- protocol types and JSON-RPC primitives
//! - `client`    -- transport-agnostic async JSON-RPC 2.0 client
//! - `protocol`  -- typed MCP lifecycle wrapper over `JsonRpcClient`
//! - `transport` -- `Transport` trait with stdio, SSE and HTTP implementations
//! - `server`    -- `ToolServer` sessions and the `Connector` that opens them
//! - `registry`  -- `ConnectionRegistry`, the owner of live connections
//! - `naming`    -- qualified `server__tool` names
//! - `records`   -- persisted server records, import/export and status
//! - `config`    -- the `mcp:` configuration section

pub mod client;
pub mod config;
pub mod naming;
pub mod protocol;
pub mod records;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

pub use naming::{tool_display_name, QualifiedToolName};
pub use registry::{ConnectionRegistry, ToolDescriptor};
pub use server::{ToolServer, TransportConfig, TransportKind};
