//! Read-only access to the persisted key-value store.
//!
//! The authentication flow owns writes; this subsystem only reads. The store
//! is injected wherever auth is needed instead of being reached as a global.
//!
//! Two backends:
//! - [`MemoryStore`]: map-backed, used by tests and embedders that already
//!   hold the values in memory.
//! - [`JsonFileStore`]: a flat JSON object on disk (e.g. an exported browser
//!   storage dump), read afresh on every lookup so writes by the auth flow
//!   show up on the next call. Missing or corrupt files read as empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde_json::Value;

/// A string-keyed, string-valued store, like browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// A JSON object file, re-read on every access.
///
/// String values are kept verbatim; any other JSON value is kept as its
/// serialized text, which is what a browser store would hold for it.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries currently on disk.
    pub fn len(&self) -> usize {
        read_entries(&self.path).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        read_entries(&self.path).remove(key)
    }
}

fn read_entries(path: &Path) -> HashMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read session store; treating as empty");
            return HashMap::new();
        }
    };

    if content.trim().is_empty() {
        return HashMap::new();
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key, text)),
                Value::Null => None,
                other => Some((key, other.to_string())),
            })
            .collect(),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "Session store is not a JSON object; treating as empty");
            HashMap::new()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Session store is corrupt; treating as empty");
            HashMap::new()
        }
    }
}
