//! File-backed credential store (durable profile).

use crate::{CredentialStore, VaultError, VaultResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Durable key/value store persisted as a JSON object on disk.
///
/// Every write goes through to the file; reads are served from the
/// in-memory map loaded at construction. The store tolerates a missing
/// file (treated as empty) but surfaces corrupt contents as errors.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a file store at `path`, loading existing entries if present.
    pub fn open(path: impl Into<PathBuf>) -> VaultResult<Self> {
        let path = path.into();
        let data = Self::load(&path)?;

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn load(path: &Path) -> VaultResult<HashMap<String, String>> {
        if !path.exists() {
            debug!(path = %path.display(), "No credential file yet, starting empty");
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let data: HashMap<String, String> = serde_json::from_str(&content)?;
        Ok(data)
    }

    fn persist(&self, data: &HashMap<String, String>) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn lock(&self) -> VaultResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.data
            .lock()
            .map_err(|_| VaultError::Backend("file store lock poisoned".to_string()))
    }
}

impl CredentialStore for FileStore {
    fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        let mut data = self.lock()?;
        data.insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> VaultResult<bool> {
        let mut data = self.lock()?;
        let removed = data.remove(key).is_some();
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }
}
