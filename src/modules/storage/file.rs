use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, warn};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use super::durable::{DurableStore, StoreError};

/// Store backed by a single JSON object file holding every key.
///
/// The file is read once at open time and rewritten in full on each mutation through a
/// temp file in the same directory followed by a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match File::open(&path) {
            Ok(file) => match serde_json::from_reader::<_, Map<String, Value>>(BufReader::new(file)) {
                Ok(map) => map,
                Err(e) => {
                    // Same fallback as an unreadable user file: start over rather than fail
                    warn!(
                        "Store file {} is not a JSON object ({}); starting with an empty store",
                        path.display(),
                        e
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        debug!("Opened store {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let data = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Serialize {
            key: self.path.display().to_string(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn mutate(&self, apply: impl FnOnce(&mut Map<String, Value>)) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        apply(&mut next);
        // Only commit to memory once the file write went through
        self.write_atomically(&next)?;
        *entries = next;
        Ok(())
    }
}

impl DurableStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}
