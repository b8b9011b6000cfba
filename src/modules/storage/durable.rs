use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by store adapters
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("stored value for key '{key}' is malformed: {source}")]
    Deserialize {
        key: String,
        source: serde_json::Error,
    },
}

/// Persistent key to JSON value map shared by the directory and the session slot.
///
/// Every `set` replaces the whole value for its key; adapters must never expose a
/// partially written value to readers.
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Drop `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store for tests and callers that don't need persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decode the value stored under `key`, reporting malformed data against that key
pub fn decode_value<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Deserialize {
        key: key.to_string(),
        source,
    })
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
