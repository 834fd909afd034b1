//! Tool executor trait for Toolrelay
//!
//! This module defines the [`ToolExecutor`] trait the agentic loop uses to
//! discover and invoke tools. [`ConnectionRegistry`] implements it over the
//! live MCP connections; tests substitute in-process executors.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::mcp::{ConnectionRegistry, QualifiedToolName};
use crate::providers::ToolDeclaration;

/// Tool executor trait
///
/// Tools are addressed by their qualified name (`server__tool`).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Declarations for every tool currently available
    async fn declarations(&self) -> Vec<ToolDeclaration>;

    /// Execute the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns error if the tool cannot be reached or reports a failure
    async fn execute(&self, name: &QualifiedToolName, args: Value) -> Result<Value>;
}

#[async_trait]
impl ToolExecutor for ConnectionRegistry {
    async fn declarations(&self) -> Vec<ToolDeclaration> {
        self.get_all_tools()
            .await
            .iter()
            .map(ToolDeclaration::from)
            .collect()
    }

    async fn execute(&self, name: &QualifiedToolName, args: Value) -> Result<Value> {
        self.call_qualified(name, args).await
    }
}
