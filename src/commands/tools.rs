//! Tool listing handler

use super::{build_registry, connect_servers};
use crate::config::Config;
use crate::error::Result;
use crate::mcp::ToolDescriptor;

/// Connect the configured servers and print every tool they expose
///
/// Servers that fail to connect are reported on stderr and skipped.
///
/// # Errors
///
/// Returns error only if stdout cannot be written
pub async fn list_tools(config: &Config) -> Result<()> {
    let registry = build_registry(config);
    let failures = connect_servers(&registry, &config.mcp.servers).await;
    for (server, detail) in &failures {
        eprintln!("warning: server {} unavailable: {}", server, detail);
    }

    let tools = registry.get_all_tools().await;
    registry.disconnect_all().await;

    if tools.is_empty() {
        println!("No tools available.");
        return Ok(());
    }
    for line in render_tools(&tools) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per tool: qualified name, then the description when present
pub fn render_tools(tools: &[ToolDescriptor]) -> Vec<String> {
    let width = tools
        .iter()
        .map(|t| t.qualified_name().len())
        .max()
        .unwrap_or(0);
    tools
        .iter()
        .map(|tool| match tool.description.as_deref() {
            Some(description) if !description.is_empty() => {
                let summary = description.lines().next().unwrap_or_default();
                format!("{:<width$}  {}", tool.qualified_name(), summary, width = width)
            }
            _ => tool.qualified_name(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(server: &str, name: &str, description: Option<&str>) -> ToolDescriptor {
        ToolDescriptor {
            server_id: server.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            input_schema: serde_json::json!({ "type": "object" }),
        }
    }

    #[test]
    fn test_render_tools_aligns_descriptions() {
        let lines = render_tools(&[
            descriptor("files", "read", Some("Read a file\nwith details")),
            descriptor("s1", "a__b", None),
        ]);
        assert_eq!(lines[0], "files__read  Read a file");
        assert_eq!(lines[1], "s1__a__b");
    }
}
