//! MCP transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait that every tool-server
//! transport satisfies. Concrete implementations live in submodules:
//!
//! - [`stdio::StdioTransport`] -- spawns a child process and exchanges
//!   newline-delimited JSON over its stdin/stdout pipes.
//! - [`sse::SseTransport`] -- legacy HTTP+SSE: a long-lived `GET` event
//!   stream announces a POST endpoint via an `endpoint` event.
//! - [`http::HttpTransport`] -- Streamable HTTP: every message is a `POST`,
//!   answered with either a JSON body or an SSE stream.
//! - [`fake::FakeTransport`] -- in-process fake used in tests (cfg(test)
//!   only).
//!
//! Callers `send` a serialized JSON-RPC string and `receive` a stream of
//! serialized JSON-RPC strings (one per logical message). Framing and
//! session management belong to each implementation.
//!
//! The `receive_err` stream carries transport diagnostics (stderr lines from
//! a child process). Diagnostic output is never treated as an error.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

/// Abstraction over MCP transport implementations.
///
/// # Examples
///
/// ```no_run
/// use toolrelay::mcp::transport::Transport;
///
/// // Implementations are created via their own constructors and then used
/// // polymorphically through `Arc<dyn Transport>`.
/// ```
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a complete JSON-RPC message string to the remote peer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RelayError::McpTransport`] if the underlying
    /// I/O operation fails.
    async fn send(&self, message: String) -> Result<()>;

    /// Returns a stream of inbound JSON-RPC message strings.
    ///
    /// The stream ends when the transport is closed or the peer disconnects.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Returns a stream of transport-level diagnostic strings.
    ///
    /// Network transports return an empty stream.
    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Release transport resources (child process, open HTTP session).
    ///
    /// The default implementation does nothing; dropping the transport is
    /// enough for most implementations.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub mod http;
pub mod sse;
pub mod stdio;

#[cfg(test)]
pub mod fake;
