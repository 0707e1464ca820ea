//! Session-scoped key/value storage for small text documents (the notes).
//!
//! [`MemoryStorage`] lives as long as the process; [`FileStorage`] keeps one
//! file per key in the configured session directory so that successive runs
//! of the terminal front end share a session until the directory is cleared.

use crate::error::DocIntelliError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Minimal string storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DocIntelliError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DocIntelliError>;
    fn remove(&self, key: &str) -> Result<(), DocIntelliError>;
}

/// In-process storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, DocIntelliError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DocIntelliError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DocIntelliError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path backing `key`. Characters outside `[A-Za-z0-9._-]` map to `_`,
    /// as does every character of an all-dot key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        if key.chars().all(|c| c == '.') {
            return self.dir.join("_".repeat(key.len().max(1)));
        }
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(name)
    }
}

fn storage_err(key: &str) -> impl FnOnce(std::io::Error) -> DocIntelliError + '_ {
    move |source| DocIntelliError::Storage {
        key: key.to_string(),
        source,
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, DocIntelliError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(key)(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DocIntelliError> {
        std::fs::create_dir_all(&self.dir).map_err(storage_err(key))?;
        // Write to a sibling temp file, then rename over the target.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage_err(key))?;
        tmp.write_all(value.as_bytes()).map_err(storage_err(key))?;
        tmp.persist(self.path_for(key))
            .map_err(|e| storage_err(key)(e.error))?;
        debug!("Stored {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DocIntelliError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(key)(e)),
        }
    }
}
