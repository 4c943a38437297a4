//! Data structures for registry records and config entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A server record from the registry `/servers` listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub homepage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<ConfigSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
}

impl ServerDescriptor {
    /// Display name, falling back to the registry name.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a server is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Npx,
    Docker,
    Binary,
    #[serde(other)]
    Unknown,
}

impl Runtime {
    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Npx => "npx",
            Runtime::Docker => "docker",
            Runtime::Binary => "binary",
            Runtime::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, ConfigOption>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Entry written under `mcpServers.<name>` in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRuntimeConfig {
    pub command: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Number of catalog servers in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_registry_record() {
        let raw = r#"{
            "name": "postgres",
            "displayName": "PostgreSQL",
            "description": "Query databases",
            "author": "acme",
            "repository": "https://github.com/acme/postgres",
            "homepage": "https://acme.dev",
            "category": "databases",
            "tags": ["sql", "db"],
            "version": "1.2.0",
            "lastUpdated": "2024-05-01T00:00:00Z",
            "runtime": "docker",
            "command": "postgres-mcp",
            "configSchema": {
                "type": "object",
                "properties": {
                    "DATABASE_URL": {"type": "string", "description": "Connection string", "secret": true}
                },
                "required": ["DATABASE_URL"]
            },
            "downloads": 1200
        }"#;
        let server: ServerDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(server.label(), "PostgreSQL");
        assert_eq!(server.runtime, Some(Runtime::Docker));
        let schema = server.config_schema.unwrap();
        assert!(schema.properties["DATABASE_URL"].secret);
        assert_eq!(schema.required, vec!["DATABASE_URL"]);
        assert_eq!(server.downloads, Some(1200));
        assert_eq!(server.stars, None);
    }

    #[test]
    fn tolerates_sparse_records_and_unknown_runtime() {
        let server: ServerDescriptor = serde_json::from_str(r#"{"name": "x", "runtime": "python"}"#).unwrap();
        assert_eq!(server.runtime, Some(Runtime::Unknown));
        assert_eq!(server.label(), "x");
        assert!(server.tags.is_empty());
    }

    #[test]
    fn null_fields_read_as_empty() {
        let raw = r#"[
            {"name": "ok"},
            {"name": "n", "displayName": null, "description": null, "author": null, "tags": null, "category": null, "runtime": null}
        ]"#;
        let servers: Vec<ServerDescriptor> = serde_json::from_str(raw).unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].description, "");
        assert!(servers[1].tags.is_empty());
        assert_eq!(servers[1].label(), "n");
        assert_eq!(servers[1].runtime, None);
    }

    #[test]
    fn runtime_config_omits_missing_env() {
        let config = ServerRuntimeConfig {
            command: "npx".to_string(),
            args: vec!["-y".to_string()],
            env: None,
        };
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"command":"npx","args":["-y"]}"#);
    }
}
