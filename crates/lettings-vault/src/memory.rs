//! In-memory credential store (ephemeral profile).

use crate::{CredentialStore, VaultError, VaultResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-lifetime key/value store.
///
/// Backs the ephemeral profile: entries vanish when the process exits,
/// matching session-scoped storage semantics.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> VaultResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.data
            .lock()
            .map_err(|_| VaultError::Backend("memory store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> VaultResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }
}
