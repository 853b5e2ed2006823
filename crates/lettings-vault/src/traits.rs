//! Storage trait definitions.

use crate::VaultResult;

/// Trait for credential storage backends
pub trait CredentialStore: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> VaultResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> VaultResult<Option<String>>;

    /// Delete a value
    fn delete(&self, key: &str) -> VaultResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> VaultResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
