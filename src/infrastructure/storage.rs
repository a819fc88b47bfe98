//! Key-value stores backing the command map.

use crate::domain::store::{KeyValueStore, StorageError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub const CONTROLS_FILE: &str = "controls.json";

/// Flat JSON object on disk, rewritten on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// one is reported and also starts empty so the remote stays usable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load_from_file(&path) {
            Ok(entries) => entries,
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Could not read {}: {}. Starting with defaults.", path.display(), e);
                BTreeMap::new()
            }
        };
        debug!("Opened key store {} ({} entries)", path.display(), entries.len());
        Self { path, entries }
    }

    /// `controls.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(CONTROLS_FILE))
    }

    fn load_from_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    /// Only takes effect in memory once the file has been written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut updated = self.entries.clone();
        updated.insert(key.to_string(), value.to_string());
        self.save(&updated)?;
        self.entries = updated;
        Ok(())
    }
}

/// In-process store. Clones share the same entries, so a clone handed to a
/// second controller sees everything the first one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
