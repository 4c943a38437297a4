//! Local persistent state.
//!
//! A small JSON key-value file in the storage directory. Its only current use is
//! remembering which servers this tool installed; that list is bookkeeping and
//! never overrides what the config file says.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::utils::atomic_write;

pub const INSTALLED_SERVERS_KEY: &str = "installedServers";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse state {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("Failed to write state {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle to a persistent key-value store.
pub trait StateStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn update(&self, key: &str, value: Value) -> Result<(), StateError>;
}

/// Store backed by a JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        match self.load() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    fn update(&self, key: &str, value: Value) -> Result<(), StateError> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        let output = serde_json::to_string_pretty(&map)?;
        atomic_write(&self.path, output.as_bytes()).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-process store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<Map<String, Value>>,
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn update(&self, key: &str, value: Value) -> Result<(), StateError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Names recorded as installed by this tool.
pub fn tracked_servers(store: &dyn StateStore) -> Vec<String> {
    store
        .get(INSTALLED_SERVERS_KEY)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

pub fn track_server(store: &dyn StateStore, name: &str) -> Result<(), StateError> {
    let mut installed = tracked_servers(store);
    if installed.iter().any(|n| n == name) {
        return Ok(());
    }
    installed.push(name.to_string());
    store.update(INSTALLED_SERVERS_KEY, serde_json::to_value(installed)?)
}

pub fn untrack_server(store: &dyn StateStore, name: &str) -> Result<(), StateError> {
    let installed: Vec<String> = tracked_servers(store).into_iter().filter(|n| n != name).collect();
    store.update(INSTALLED_SERVERS_KEY, serde_json::to_value(installed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trip_keeps_other_keys() {
        let temp = tempdir().unwrap();
        let store = FileStateStore::new(temp.path().join("nested/state.json"));
        assert!(store.get("anything").is_none());

        store.update("theme", Value::from("dark")).unwrap();
        track_server(&store, "foo").unwrap();
        track_server(&store, "bar").unwrap();
        track_server(&store, "foo").unwrap();

        let reopened = FileStateStore::new(store.path());
        assert_eq!(tracked_servers(&reopened), vec!["foo", "bar"]);
        assert_eq!(reopened.get("theme"), Some(Value::from("dark")));

        untrack_server(&reopened, "foo").unwrap();
        assert_eq!(tracked_servers(&store), vec!["bar"]);
    }

    #[test]
    fn corrupt_file_reads_as_empty_but_refuses_update() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStateStore::new(&path);
        assert!(tracked_servers(&store).is_empty());
        assert!(matches!(track_server(&store, "foo"), Err(StateError::Parse { .. })));
    }

    #[test]
    fn memory_store() {
        let store = MemoryStateStore::default();
        track_server(&store, "a").unwrap();
        untrack_server(&store, "missing").unwrap();
        assert_eq!(tracked_servers(&store), vec!["a"]);
    }

    #[test]
    fn memory_store_survives_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStateStore::default());
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.values.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(store.values.is_poisoned());

        track_server(store.as_ref(), "a").unwrap();
        assert_eq!(tracked_servers(store.as_ref()), vec!["a"]);
    }
}
