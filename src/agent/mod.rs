//! Agent module for Toolrelay
//!
//! This module contains the agentic loop: per-request state, the tool
//! executor seam and the loop controller that alternates between model
//! generation and tool execution.

pub mod conversation;
pub mod core;
pub mod executor;

pub use conversation::{ChatRequest, FinishReason, LoopOutcome, LoopState};
pub use core::AgenticLoop;
pub use executor::ToolExecutor;
