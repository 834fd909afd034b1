//! Stream events and function-call records

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item on the outbound channel, in emission order.
///
/// # Examples
///
/// ```
/// use toolrelay::stream::StreamEvent;
///
/// let event = StreamEvent::call_start("s1__search", serde_json::json!({}));
/// let json = serde_json::to_string(&event).unwrap();
/// assert!(json.contains(r#""type":"call_start""#));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of model text.
    Text {
        /// Fragment content.
        text: String,
    },

    /// A tool call is about to run.
    CallStart {
        /// Qualified tool name.
        name: String,
        /// Arguments the model supplied.
        #[serde(default)]
        arguments: Value,
    },

    /// A tool call settled.
    CallResult {
        /// Qualified tool name.
        name: String,
        /// Tool output on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Failure message on error.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The round limit was reached before the model stopped calling tools.
    Truncated {
        /// Rounds executed.
        rounds: u32,
    },
}

impl StreamEvent {
    /// Text fragment event.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// `call_start` event.
    pub fn call_start(name: impl Into<String>, arguments: Value) -> Self {
        Self::CallStart {
            name: name.into(),
            arguments,
        }
    }

    /// `call_result` event for a settled call.
    pub fn call_result(name: impl Into<String>, outcome: std::result::Result<Value, String>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(message) => (None, Some(message)),
        };
        Self::CallResult {
            name: name.into(),
            result,
            error,
        }
    }

    /// Whether this is a text fragment.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

/// Lifecycle state of a requested call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Requested, not yet settled.
    Pending,
    /// Completed with a result.
    Success,
    /// Completed with an error.
    Error,
}

/// A tool call the model requested and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRecord {
    /// Qualified tool name.
    pub name: String,
    /// Arguments the model supplied.
    pub arguments: Value,
    /// Current status.
    pub status: CallStatus,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FunctionCallRecord {
    /// A new pending record.
    pub fn pending(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            status: CallStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Settle the record. Returns `false`, leaving the record untouched, if
    /// it has already settled.
    pub fn settle(&mut self, outcome: std::result::Result<Value, String>) -> bool {
        if self.status != CallStatus::Pending {
            return false;
        }
        match outcome {
            Ok(value) => {
                self.status = CallStatus::Success;
                self.result = Some(value);
            }
            Err(message) => {
                self.status = CallStatus::Error;
                self.error = Some(message);
            }
        }
        true
    }

    /// The entry fed back to the model for this call: `{name, response}` or
    /// `{name, error}`.
    pub fn to_model_input(&self) -> Value {
        match (&self.result, &self.error) {
            (_, Some(error)) => serde_json::json!({ "name": self.name, "error": error }),
            (Some(result), None) => serde_json::json!({ "name": self.name, "response": result }),
            (None, None) => {
                serde_json::json!({ "name": self.name, "error": "call did not complete" })
            }
        }
    }
}

/// Render a tool result for display.
///
/// When the result is an MCP content array led by a text item, that text is
/// shown, pretty-printed if it is itself JSON. Anything else is
/// pretty-printed as JSON.
///
/// # Examples
///
/// ```
/// use toolrelay::stream::format_tool_result;
///
/// let result = serde_json::json!([{ "type": "text", "text": "{\"a\":1}" }]);
/// assert_eq!(format_tool_result(&result), "{\n  \"a\": 1\n}");
/// ```
pub fn format_tool_result(result: &Value) -> String {
    let leading_text = result
        .as_array()
        .and_then(|items| items.first())
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str);

    match leading_text {
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) if parsed.is_object() || parsed.is_array() => {
                serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| text.to_string())
            }
            _ => text.to_string(),
        },
        None => serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string()),
    }
}
