//! Per-request loop state
//!
//! A [`ChatRequest`] enters the loop; [`LoopState`] accumulates the reply
//! while rounds run; [`LoopOutcome`] is what the caller gets back.

use serde::{Deserialize, Serialize};

use crate::providers::{FunctionInvocation, Turn};
use crate::stream::FunctionCallRecord;

/// Inbound chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,
    /// Prior conversation turns, oldest first
    #[serde(default)]
    pub history: Vec<Turn>,
    /// Whether tool schemas are declared to the model
    #[serde(default = "default_tools_enabled")]
    pub tools_enabled: bool,
}

fn default_tools_enabled() -> bool {
    true
}

impl ChatRequest {
    /// Request with no history and tools enabled
    ///
    /// # Examples
    ///
    /// ```
    /// use toolrelay::agent::ChatRequest;
    ///
    /// let request = ChatRequest::new("What time is it?");
    /// assert!(request.tools_enabled);
    /// assert!(request.history.is_empty());
    /// ```
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            tools_enabled: true,
        }
    }

    /// Same request with tools disabled
    pub fn without_tools(mut self) -> Self {
        self.tools_enabled = false;
        self
    }

    /// Same request continuing from `history`
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model answered without requesting further calls
    Complete,
    /// The round limit was reached
    MaxRounds,
    /// The consumer went away
    Cancelled,
}

/// Result of one loop run
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    /// All text produced across rounds
    pub text: String,
    /// Generations performed
    pub rounds: u32,
    /// Every function call requested, in request order
    pub calls: Vec<FunctionCallRecord>,
    /// Conversation including this request, for follow-up requests
    pub turns: Vec<Turn>,
    /// Why the loop stopped
    pub finish: FinishReason,
}

/// Mutable state for one request.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    text: String,
    calls: Vec<FunctionCallRecord>,
    rounds: u32,
    turns: Vec<Turn>,
}

impl LoopState {
    /// Start from the request's history
    pub fn new(history: Vec<Turn>) -> Self {
        Self {
            turns: history,
            ..Default::default()
        }
    }

    /// Count a new generation and return its 1-based number
    pub fn begin_round(&mut self) -> u32 {
        self.rounds += 1;
        self.rounds
    }

    /// Generations performed so far
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Append streamed text
    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Conversation turns so far
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Record a finished generation: the input that prompted it and the
    /// assistant reply.
    pub fn record_exchange(
        &mut self,
        input: String,
        reply: String,
        function_calls: Vec<FunctionInvocation>,
    ) {
        self.turns.push(Turn::user(input));
        self.turns.push(Turn::assistant(reply, function_calls));
    }

    /// Register pending records for a batch of calls; returns the index of
    /// the first.
    pub fn start_calls(&mut self, calls: &[FunctionInvocation]) -> usize {
        let base = self.calls.len();
        self.calls.extend(
            calls
                .iter()
                .map(|c| FunctionCallRecord::pending(c.name.clone(), c.arguments.clone())),
        );
        base
    }

    /// Settle the record at `index`.
    pub fn settle_call(&mut self, index: usize, outcome: Result<serde_json::Value, String>) {
        if let Some(record) = self.calls.get_mut(index) {
            if !record.settle(outcome) {
                tracing::warn!(index, name = %record.name, "call settled twice");
            }
        }
    }

    /// Model input for the batch starting at `base`: a JSON array of each
    /// call's result or error, in request order.
    pub fn results_input(&self, base: usize) -> String {
        let results: Vec<serde_json::Value> = self.calls[base..]
            .iter()
            .map(FunctionCallRecord::to_model_input)
            .collect();
        serde_json::Value::Array(results).to_string()
    }

    /// Finish the request
    pub fn into_outcome(self, finish: FinishReason) -> LoopOutcome {
        LoopOutcome {
            text: self.text,
            rounds: self.rounds,
            calls: self.calls,
            turns: self.turns,
            finish,
        }
    }
}
