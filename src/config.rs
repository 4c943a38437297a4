//! MCP config file editing.
//!
//! The `mcpServers` mapping of the config file is the source of truth for what
//! is installed. Writes go through [`crate::jsonc`] so that user comments and
//! indentation outside the edited entry survive, and every write is preceded by
//! a copy of the previous file at `<path>.backup`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::jsonc;
use crate::models::ServerRuntimeConfig;
use crate::utils::{atomic_write, sibling_with_suffix};

pub const SERVERS_KEY: &str = "mcpServers";

const EMPTY_CONFIG: &str = "{\n  \"mcpServers\": {}\n}\n";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file does not exist: {}", .0.display())]
    Missing(PathBuf),
    #[error("No backup found at {}", .0.display())]
    NoBackup(PathBuf),
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("Failed to restore backup of {}: {source}", .path.display())]
    Restore { path: PathBuf, source: std::io::Error },
    #[error("Failed to edit {}: {source}", .path.display())]
    Edit { path: PathBuf, source: jsonc::EditError },
    #[error("Failed to serialize server entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Create a minimal config at `path` if none exists. Returns whether it was created.
pub fn ensure_exists(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    atomic_write(path, EMPTY_CONFIG.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Created new config file at {}", path.display());
    Ok(true)
}

/// Insert or overwrite `mcpServers.<name>`.
pub fn upsert_server(path: &Path, name: &str, config: &ServerRuntimeConfig) -> Result<(), ConfigError> {
    info!("Adding MCP server \"{}\" to {}", name, path.display());
    ensure_exists(path)?;

    let value = serde_json::to_value(config)?;
    let content = read(path)?;
    let updated = jsonc::set_value(&content, &[SERVERS_KEY, name], &value).map_err(|source| ConfigError::Edit {
        path: path.to_path_buf(),
        source,
    })?;

    backup(path);
    write(path, &updated)?;
    info!("Added \"{}\" to config", name);
    Ok(())
}

/// Delete `mcpServers.<name>`. A missing entry is not an error.
pub fn remove_server(path: &Path, name: &str) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    info!("Removing MCP server \"{}\" from {}", name, path.display());

    let content = read(path)?;
    let updated = jsonc::remove_value(&content, &[SERVERS_KEY, name]).map_err(|source| ConfigError::Edit {
        path: path.to_path_buf(),
        source,
    })?;
    if updated == content {
        debug!("\"{}\" not present in {}; nothing to remove", name, path.display());
        return Ok(());
    }

    backup(path);
    write(path, &updated)?;
    info!("Removed \"{}\" from config", name);
    Ok(())
}

/// Whether `mcpServers.<name>` is present. Unreadable or malformed files count as absent.
pub fn server_exists(path: &Path, name: &str) -> bool {
    load_servers(path).is_some_and(|servers| servers.contains_key(name))
}

/// Names under `mcpServers`. Empty when the file is missing or malformed.
pub fn list_installed_servers(path: &Path) -> BTreeSet<String> {
    load_servers(path)
        .map(|servers| servers.keys().cloned().collect())
        .unwrap_or_default()
}

/// Copy `<path>.backup` back over `path`.
pub fn restore_from_backup(path: &Path) -> Result<(), ConfigError> {
    let backup = backup_path(path);
    if !backup.is_file() {
        return Err(ConfigError::NoBackup(backup));
    }
    std::fs::copy(&backup, path).map_err(|source| ConfigError::Restore {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Restored {} from backup", path.display());
    Ok(())
}

pub fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".backup")
}

fn load_servers(path: &Path) -> Option<serde_json::Map<String, serde_json::Value>> {
    let content = std::fs::read_to_string(path).ok()?;
    match jsonc::parse(&content) {
        Ok(Some(serde_json::Value::Object(mut root))) => match root.remove(SERVERS_KEY) {
            Some(serde_json::Value::Object(servers)) => Some(servers),
            _ => Some(serde_json::Map::new()),
        },
        Ok(_) => None,
        Err(e) => {
            debug!("Ignoring malformed config {}: {}", path.display(), e);
            None
        }
    }
}

/// Best effort: a failed backup is logged and the write goes ahead.
fn backup(path: &Path) {
    let backup = backup_path(path);
    match std::fs::copy(path, &backup) {
        Ok(_) => debug!("Created backup at {}", backup.display()),
        Err(e) => warn!("Failed to create backup at {}: {}", backup.display(), e),
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, content: &str) -> Result<(), ConfigError> {
    atomic_write(path, content.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn npx(name: &str) -> ServerRuntimeConfig {
        ServerRuntimeConfig {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), format!("@smithery/{name}")],
            env: None,
        }
    }

    #[test]
    fn ensure_exists_writes_minimal_document() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".cursor/mcp.json");

        assert!(ensure_exists(&path).unwrap());
        assert!(!ensure_exists(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), EMPTY_CONFIG);
        assert!(list_installed_servers(&path).is_empty());
    }

    #[test]
    fn upsert_then_remove_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");

        upsert_server(&path, "foo", &npx("foo")).unwrap();
        assert!(server_exists(&path, "foo"));

        remove_server(&path, "foo").unwrap();
        assert!(!server_exists(&path, "foo"));
        assert_eq!(fs::read_to_string(&path).unwrap(), EMPTY_CONFIG);
    }

    #[test]
    fn upsert_overwrites_without_duplicating() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");

        upsert_server(&path, "foo", &npx("foo")).unwrap();
        let mut changed = npx("foo");
        changed.command = "bunx".to_string();
        upsert_server(&path, "foo", &changed).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("\"foo\"").count(), 1);
        assert!(content.contains("\"bunx\""));
        assert_eq!(list_installed_servers(&path).len(), 1);
    }

    #[test]
    fn upsert_preserves_comments_and_indentation() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        let original = "{\n    // Servers managed by hand\n    \"mcpServers\": {\n        \"local\": {\n            \"command\": \"node\",\n            \"args\": [\"server.js\"]\n        }\n    },\n    /* editor settings */\n    \"theme\": \"dark\"\n}\n";
        fs::write(&path, original).unwrap();

        upsert_server(&path, "foo", &npx("foo")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n    // Servers managed by hand\n    \"mcpServers\": {\n        \"local\": {\n            \"command\": \"node\",\n            \"args\": [\"server.js\"]\n        },\n"));
        assert!(content.ends_with("    },\n    /* editor settings */\n    \"theme\": \"dark\"\n}\n"));
        assert!(content.contains("        \"foo\": {\n            \"command\": \"npx\",\n"));
        assert!(server_exists(&path, "local"));
        assert!(server_exists(&path, "foo"));
    }

    #[test]
    fn upsert_backs_up_previous_content() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, "{ \"mcpServers\": { \"old\": {} } }").unwrap();

        upsert_server(&path, "foo", &npx("foo")).unwrap();

        let backup = fs::read_to_string(backup_path(&path)).unwrap();
        assert_eq!(backup, "{ \"mcpServers\": { \"old\": {} } }");

        restore_from_backup(&path).unwrap();
        assert!(!server_exists(&path, "foo"));
        assert!(server_exists(&path, "old"));
    }

    #[test]
    fn upsert_keeps_comment_only_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, "// managed by hand\n").unwrap();

        upsert_server(&path, "foo", &npx("foo")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("// managed by hand\n{\n"));
        assert!(server_exists(&path, "foo"));
    }

    #[test]
    fn failed_backup_does_not_block_write() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, EMPTY_CONFIG).unwrap();
        fs::create_dir(backup_path(&path)).unwrap();

        upsert_server(&path, "foo", &npx("foo")).unwrap();
        assert!(server_exists(&path, "foo"));
        assert!(backup_path(&path).is_dir());
    }

    #[test]
    fn restore_without_backup_fails() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(restore_from_backup(&path), Err(ConfigError::NoBackup(_))));
    }

    #[test]
    fn remove_requires_existing_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        assert!(matches!(remove_server(&path, "foo"), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn remove_twice_succeeds() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        upsert_server(&path, "foo", &npx("foo")).unwrap();

        remove_server(&path, "foo").unwrap();
        remove_server(&path, "foo").unwrap();
        assert!(!server_exists(&path, "foo"));
    }

    #[test]
    fn remove_missing_key_leaves_file_untouched() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        let original = "{\n  // keep me\n  \"mcpServers\": {}\n}";
        fs::write(&path, original).unwrap();

        remove_server(&path, "ghost").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn queries_swallow_parse_errors() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, "{ \"mcpServers\": { \"foo\": ").unwrap();

        assert!(!server_exists(&path, "foo"));
        assert!(list_installed_servers(&path).is_empty());
        assert!(!server_exists(&temp.path().join("missing.json"), "foo"));
    }

    #[test]
    fn mutations_propagate_parse_errors() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, "{ \"mcpServers\": [").unwrap();

        assert!(matches!(upsert_server(&path, "foo", &npx("foo")), Err(ConfigError::Edit { .. })));
        assert!(matches!(remove_server(&path, "foo"), Err(ConfigError::Edit { .. })));
    }

    #[test]
    fn whitespace_only_file_is_treated_as_empty_object() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".mcp.json");
        fs::write(&path, "\n\n").unwrap();

        upsert_server(&path, "foo", &npx("foo")).unwrap();
        assert_eq!(list_installed_servers(&path).into_iter().collect::<Vec<_>>(), vec!["foo"]);
    }
}
