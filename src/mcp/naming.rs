//! Qualified tool names
//!
//! Tools from every server share one namespace when declared to the model,
//! so each is exposed as `"<server_id>__<tool_name>"`. Splitting on the
//! first separator recovers the pair even when the tool name itself
//! contains `__`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RelayError};

/// Separator between server id and tool name.
pub const SEPARATOR: &str = "__";

/// Check that `server_id` survives a round trip through a qualified name.
///
/// The id must be non-empty, must not contain [`SEPARATOR`] and must not end
/// with `_`: `"s_"` joined to `"tool"` gives `"s___tool"`, whose first
/// separator sits one byte early.
///
/// # Errors
///
/// Returns a description of the problem.
pub fn check_server_id(server_id: &str) -> std::result::Result<(), String> {
    if server_id.trim().is_empty() {
        return Err("server id must not be empty".to_string());
    }
    if server_id.contains(SEPARATOR) {
        return Err(format!(
            "server id '{server_id}' must not contain '{SEPARATOR}'"
        ));
    }
    if server_id.ends_with('_') {
        return Err(format!("server id '{server_id}' must not end with '_'"));
    }
    Ok(())
}

/// A `(server id, tool name)` pair with a reversible string form.
///
/// # Examples
///
/// ```
/// use toolrelay::mcp::naming::QualifiedToolName;
///
/// let name = QualifiedToolName::new("s1", "a__b").unwrap();
/// assert_eq!(name.to_string(), "s1__a__b");
///
/// let parsed: QualifiedToolName = "s1__a__b".parse().unwrap();
/// assert_eq!(parsed.server_id(), "s1");
/// assert_eq!(parsed.tool_name(), "a__b");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedToolName {
    server_id: String,
    tool_name: String,
}

impl QualifiedToolName {
    /// Build a qualified name.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ToolInvocation`] when `server_id` fails
    /// [`check_server_id`] or `tool_name` is empty.
    pub fn new(server_id: impl Into<String>, tool_name: impl Into<String>) -> Result<Self> {
        let server_id = server_id.into();
        let tool_name = tool_name.into();
        check_server_id(&server_id).map_err(RelayError::ToolInvocation)?;
        if tool_name.is_empty() {
            return Err(RelayError::ToolInvocation("tool name must not be empty".into()).into());
        }
        Ok(Self {
            server_id,
            tool_name,
        })
    }

    /// Owning server id.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Tool name as the server knows it.
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Split into `(server_id, tool_name)`.
    pub fn into_parts(self) -> (String, String) {
        (self.server_id, self.tool_name)
    }
}

impl fmt::Display for QualifiedToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.server_id, SEPARATOR, self.tool_name)
    }
}

impl FromStr for QualifiedToolName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (server_id, tool_name) = s.split_once(SEPARATOR).ok_or_else(|| {
            RelayError::ToolInvocation(format!("Invalid function name format: {s}"))
        })?;
        Self::new(server_id, tool_name)
    }
}

/// Human-facing name: the tool part of a qualified name, or the whole string
/// when it carries no separator.
pub fn tool_display_name(qualified: &str) -> &str {
    qualified
        .split_once(SEPARATOR)
        .map(|(_, tool)| tool)
        .unwrap_or(qualified)
}
