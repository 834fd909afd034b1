//! Error types for Toolrelay
//!
//! This module defines all error types used throughout the crate, using
//! `thiserror` for ergonomic error handling. Fallible functions return the
//! [`Result`] alias, which carries a [`RelayError`] inside an
//! `anyhow::Error`; callers that need to branch on the failure kind use
//! `downcast_ref::<RelayError>()`.

use thiserror::Error;

/// Main error type for Toolrelay operations
///
/// The first five variants form the core taxonomy surfaced to callers of
/// the connection registry and the agentic loop. The remaining variants
/// cover the infrastructure underneath them (MCP wire protocol, model
/// provider, I/O and serialization).
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or invalid configuration (including transport-specific fields)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Handshake with a tool server failed or its transport died
    #[error("Connection error for server '{server}': {message}")]
    Connection {
        /// Server id the connection was attempted for
        server: String,
        /// Underlying failure description
        message: String,
    },

    /// Operation referenced a server id with no live connection
    #[error("Server {0} is not connected")]
    NotConnected(String),

    /// Remote tool call failed or a qualified tool name was malformed
    #[error("Tool invocation error: {0}")]
    ToolInvocation(String),

    /// The model provider's stream faulted mid-round
    #[error("Stream error: {0}")]
    Stream(String),

    /// Model provider errors (request rejected, bad response, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// MCP server returned a JSON-RPC error response
    #[error("MCP error: {0}")]
    Mcp(String),

    /// MCP transport-level failure (process spawn, pipe closed, HTTP failure)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// An MCP request did not receive a response in time
    #[error("MCP request timed out: server={server}, method={method}")]
    McpTimeout {
        /// Server the request was sent to
        server: String,
        /// JSON-RPC method that timed out
        method: String,
    },

    /// Server negotiated a protocol version this client does not speak
    #[error("MCP protocol version mismatch: expected one of {expected:?}, got {got}")]
    McpProtocolVersion {
        /// Versions this client supports
        expected: Vec<String>,
        /// Version the server selected
        got: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Toolrelay operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Returns the [`RelayError`] carried by `err`, if any.
pub fn relay_error(err: &anyhow::Error) -> Option<&RelayError> {
    err.downcast_ref::<RelayError>()
}
