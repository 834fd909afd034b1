//! Tool-server configuration
//!
//! The `mcp:` section of the config file: the JSON-RPC request timeout and
//! the list of configured server records. Omitting the section yields an
//! empty server list.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RelayError};
use crate::mcp::records::ServerRecord;

/// MCP client configuration.
///
/// # Examples
///
/// ```
/// use toolrelay::mcp::config::McpConfig;
///
/// let cfg = McpConfig::default();
/// assert_eq!(cfg.request_timeout_seconds, 30);
/// assert!(cfg.servers.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Timeout applied to every JSON-RPC request, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Configured tool servers.
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
            servers: Vec::new(),
        }
    }
}

impl McpConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Validate the timeout and every server record; ids must be unique.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_seconds == 0 {
            return Err(RelayError::Config(
                "mcp.request_timeout_seconds must be greater than 0".into(),
            )
            .into());
        }

        let mut seen = HashSet::new();
        for record in &self.servers {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(
                    RelayError::Config(format!("duplicate server id '{}'", record.id)).into(),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::server::TransportKind;

    #[test]
    fn test_missing_fields_use_defaults() {
        let cfg: McpConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, McpConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cfg = McpConfig {
            request_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut record = ServerRecord::new("remote", TransportKind::Http);
        record.url = Some("http://localhost:8080/mcp".into());
        let cfg = McpConfig {
            servers: vec![record.clone(), record],
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate server id"));
    }

    #[test]
    fn test_parses_yaml_servers() {
        let yaml = r#"
request_timeout_seconds: 10
servers:
  - id: files
    name: Files
    transportType: stdio
    command: npx
    args: ["-y", "server-files"]
    createdAt: 1700000000000
"#;
        let cfg: McpConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.servers[0].id, "files");
        cfg.validate().unwrap();
    }
}
