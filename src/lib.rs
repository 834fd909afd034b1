//! Toolrelay - streaming model replies with MCP tool calls
//!
//! This library lets a conversational model call tools on external MCP
//! servers mid-reply while a single client consumes the growing reply as
//! one ordered stream.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `mcp`: Connection registry, MCP client, transports (stdio, SSE, streamable HTTP)
//! - `agent`: The agentic loop alternating generation and concurrent tool execution
//! - `stream`: Stream events and the chunk-invariant codecs that carry them
//! - `providers`: Model provider abstraction and the Ollama implementation
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface definition and handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use toolrelay::agent::{AgenticLoop, ChatRequest};
//! use toolrelay::mcp::{ConnectionRegistry, TransportConfig};
//! use toolrelay::providers::create_provider;
//! use toolrelay::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let registry = Arc::new(ConnectionRegistry::default());
//!     registry
//!         .connect(
//!             "files",
//!             TransportConfig::Stdio {
//!                 command: "mcp-server-files".into(),
//!                 args: vec![],
//!                 env: Default::default(),
//!             },
//!         )
//!         .await?;
//!
//!     let provider = create_provider(&config.provider)?;
//!     let agent = AgenticLoop::new(provider, registry.clone(), config.agent)?;
//!     let (tx, mut rx) = mpsc::channel(64);
//!     let run = tokio::spawn(async move { agent.run(ChatRequest::new("List my files"), tx).await });
//!     while let Some(event) = rx.recv().await {
//!         println!("{:?}", event);
//!     }
//!     run.await??;
//!     registry.disconnect_all().await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod mcp;
pub mod providers;
pub mod stream;

// Re-export commonly used types
pub use agent::{AgenticLoop, ChatRequest, FinishReason, LoopOutcome};
pub use config::Config;
pub use error::{Result, RelayError};
pub use mcp::{ConnectionRegistry, QualifiedToolName};
pub use stream::{StreamDecoder, StreamEvent};
