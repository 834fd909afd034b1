//! Persisted tool-server records
//!
//! A [`ServerRecord`] is the user-managed description of a tool server:
//! identity, display metadata and transport parameters. Records serialize
//! as camelCase JSON with `createdAt` in epoch milliseconds, and the export
//! format is the bare JSON array of records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RelayError};
use crate::mcp::naming::check_server_id;
use crate::mcp::registry::ConnectionRegistry;
use crate::mcp::server::{TransportConfig, TransportKind};

/// One configured tool server.
///
/// # Examples
///
/// ```
/// use toolrelay::mcp::records::ServerRecord;
/// use toolrelay::mcp::server::TransportKind;
///
/// let mut record = ServerRecord::new("Files", TransportKind::Stdio);
/// record.command = Some("npx".into());
/// assert!(record.transport_config().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    /// Unique server id; also the prefix of qualified tool names.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Which transport to use.
    pub transport_type: TransportKind,
    /// Executable for stdio servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments for stdio servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Extra environment for stdio servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    /// Endpoint for sse/http servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ServerRecord {
    /// Create a record with a fresh id and the current timestamp.
    pub fn new(name: impl Into<String>, transport_type: TransportKind) -> Self {
        Self {
            id: new_server_id(),
            name: name.into(),
            description: None,
            transport_type,
            command: None,
            args: None,
            env: None,
            url: None,
            created_at: Utc::now(),
        }
    }

    /// Transport parameters for connecting to this server.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when the fields required by the
    /// transport kind are missing or invalid.
    pub fn transport_config(&self) -> Result<TransportConfig> {
        let config = match self.transport_type {
            TransportKind::Stdio => TransportConfig::Stdio {
                command: self.command.clone().unwrap_or_default(),
                args: self.args.clone().unwrap_or_default(),
                env: self.env.clone().unwrap_or_default(),
            },
            TransportKind::Sse => TransportConfig::Sse {
                url: self.url.clone().unwrap_or_default(),
            },
            TransportKind::Http => TransportConfig::Http {
                url: self.url.clone().unwrap_or_default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check identity fields and transport parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        check_server_id(&self.id).map_err(RelayError::Config)?;
        if self.name.trim().is_empty() {
            return Err(RelayError::Config(format!("server '{}' has no name", self.id)).into());
        }
        self.transport_config().map(|_| ())
    }
}

fn new_server_id() -> String {
    // Hyphenated v4 UUIDs never contain the qualified-name separator.
    uuid::Uuid::new_v4().to_string()
}

/// Serialize records as a pretty-printed JSON array.
pub fn export_records(records: &[ServerRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Parse an exported JSON array into fresh records.
///
/// Every record must carry a name and a `transportType` in
/// {stdio, sse, http}; each imported record receives a new id and
/// `createdAt`. The import is all-or-nothing.
///
/// # Errors
///
/// Returns [`RelayError::Config`] when the input is not a JSON array or any
/// element is invalid.
pub fn import_records(json: &str) -> Result<Vec<ServerRecord>> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| RelayError::Config(format!("invalid config format: {e}")))?;
    let items = value
        .as_array()
        .ok_or_else(|| RelayError::Config("invalid config format: expected a JSON array".into()))?;

    let now = Utc::now();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let mut item = item.clone();
        let Some(obj) = item.as_object_mut() else {
            return Err(RelayError::Config(format!("record {index} is not an object")).into());
        };

        match obj.get("transportType").and_then(|t| t.as_str()) {
            Some("stdio" | "sse" | "http") => {}
            Some(other) => {
                return Err(RelayError::Config(format!(
                    "record {index} has unknown transportType '{other}'"
                ))
                .into())
            }
            None => {
                return Err(
                    RelayError::Config(format!("record {index} is missing transportType")).into(),
                )
            }
        }

        obj.insert("id".into(), serde_json::Value::String(new_server_id()));
        obj.insert(
            "createdAt".into(),
            serde_json::Value::from(now.timestamp_millis()),
        );

        let record: ServerRecord = serde_json::from_value(item)
            .map_err(|e| RelayError::Config(format!("record {index}: {e}")))?;
        if record.name.trim().is_empty() {
            return Err(RelayError::Config(format!("record {index} has no name")).into());
        }
        records.push(record);
    }

    Ok(records)
}

/// Connection state of a configured server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServerStatus {
    /// No live connection.
    Disconnected,
    /// Live connection established at the given time.
    Connected {
        /// When the handshake completed.
        since: DateTime<Utc>,
    },
    /// The last connection attempt failed.
    Error {
        /// Failure description.
        detail: String,
    },
}

/// Status for every record, given the registry and any recorded failures.
pub async fn server_statuses(
    records: &[ServerRecord],
    registry: &ConnectionRegistry,
    failures: &HashMap<String, String>,
) -> Vec<(ServerRecord, ServerStatus)> {
    let connected: HashMap<String, DateTime<Utc>> = registry
        .list_connections()
        .await
        .into_iter()
        .map(|info| (info.server_id, info.connected_at))
        .collect();

    records
        .iter()
        .map(|record| {
            let status = match (connected.get(&record.id), failures.get(&record.id)) {
                (Some(since), _) => ServerStatus::Connected { since: *since },
                (None, Some(detail)) => ServerStatus::Error {
                    detail: detail.clone(),
                },
                (None, None) => ServerStatus::Disconnected,
            };
            (record.clone(), status)
        })
        .collect()
}
