//! Credential storage abstraction for the lettings session client.
//!
//! This crate provides the two storage profiles the session core writes
//! tokens into:
//! - **Durable**: survives process restarts (JSON-backed file store)
//! - **Ephemeral**: lives for the current process only (in-memory store)
//!
//! The [`TokenVault`] facade owns one backend per profile and enforces the
//! pairing invariant: an access token and its refresh token are always
//! written together and cleared together.

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::CredentialStore;
pub use vault::{SessionMeta, StoreProfile, TokenPair, TokenVault};

use thiserror::Error;

/// Error type for credential storage operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for credential storage operations.
pub type VaultResult<T> = Result<T, VaultError>;
