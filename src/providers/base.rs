//! Base provider trait and common types for Toolrelay
//!
//! This module defines the [`ModelProvider`] trait that model backends
//! implement, along with the request and fragment types exchanged with the
//! agentic loop. Providers stream their reply: each [`Fragment`] carries a
//! piece of text and any function calls the model requested in it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mcp::ToolDescriptor;

/// One function call requested by the model.
///
/// `name` is the qualified tool name the model was offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInvocation {
    /// Qualified tool name (`server__tool`)
    pub name: String,
    /// Arguments object supplied by the model
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl FunctionInvocation {
    /// Creates a new invocation
    ///
    /// # Examples
    ///
    /// ```
    /// use toolrelay::providers::FunctionInvocation;
    ///
    /// let call = FunctionInvocation::new("s1__search", serde_json::json!({ "q": "rust" }));
    /// assert_eq!(call.name, "s1__search");
    /// ```
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// A piece of a streamed model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    /// Text produced in this fragment (may be empty)
    pub text: String,
    /// Function calls requested in this fragment
    pub function_calls: Vec<FunctionInvocation>,
}

impl Fragment {
    /// Text-only fragment
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_calls: Vec::new(),
        }
    }

    /// Fragment carrying function calls and no text
    pub fn calls(function_calls: Vec<FunctionInvocation>) -> Self {
        Self {
            text: String::new(),
            function_calls,
        }
    }
}

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Qualified tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

impl From<&ToolDescriptor> for ToolDeclaration {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            name: tool.qualified_name(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: tool.input_schema.clone(),
        }
    }
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Role of the speaker (user, assistant, system)
    pub role: String,
    /// Text content of the turn
    #[serde(default)]
    pub content: String,
    /// Function calls the assistant requested in this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionInvocation>,
}

impl Turn {
    /// Creates a user turn
    ///
    /// # Examples
    ///
    /// ```
    /// use toolrelay::providers::Turn;
    ///
    /// let turn = Turn::user("Hello");
    /// assert_eq!(turn.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            function_calls: Vec::new(),
        }
    }

    /// Creates an assistant turn
    pub fn assistant(content: impl Into<String>, function_calls: Vec<FunctionInvocation>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            function_calls,
        }
    }

    /// Creates a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            function_calls: Vec::new(),
        }
    }
}

/// Input to one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    /// Prior conversation turns, oldest first
    pub history: Vec<Turn>,
    /// The new user-side input for this generation
    pub input: String,
    /// Tools the model may call; empty disables calling
    pub tools: Vec<ToolDeclaration>,
}

/// Stream of reply fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// Model backend that streams replies.
///
/// Implementations must be `Send + Sync` so one provider can serve
/// concurrent requests behind an `Arc`.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Starts a generation and returns its fragment stream
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be started. Failures after the
    /// stream has begun are yielded as `Err` items.
    async fn stream(&self, request: GenerateRequest) -> Result<FragmentStream>;

    /// Name of the model answering requests
    fn model_name(&self) -> String;
}
