use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app_dirs::AppDirs;
use crate::error::StoreError;

/// Key/value persistence for serialized snapshots
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn SnapshotStore>;

pub fn load_json<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Codec {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(
    store: &dyn SnapshotStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// One JSON file per key in a directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            dir: AppDirs::state_dir().unwrap_or_else(|| PathBuf::from("bellwork_state")),
        }
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Default for FileSnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// In-process store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        value: u32,
    }

    #[test]
    fn file_store_roundtrip_and_remove() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::with_dir(dir.path().join("nested"));
        assert_eq!(store.get("missing").unwrap(), None);

        save_json(&store, "probe", &Probe { value: 7 }).unwrap();
        let loaded: Option<Probe> = load_json(&store, "probe").unwrap();
        assert_eq!(loaded, Some(Probe { value: 7 }));

        store.remove("probe").unwrap();
        assert_eq!(store.get("probe").unwrap(), None);
        // removing twice is fine
        store.remove("probe").unwrap();
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let view = store.clone();
        store.set("k", "v").unwrap();
        assert!(view.contains("k"));
        view.remove("k").unwrap();
        assert!(!store.contains("k"));
    }

    #[test]
    fn corrupt_entry_reports_codec_error() {
        let store = MemoryStore::new();
        store.set("probe", "{not json").unwrap();
        let result: Result<Option<Probe>, _> = load_json(&store, "probe");
        assert!(matches!(result, Err(StoreError::Codec { .. })));
    }
}
