//! High-level API for storing and retrieving the session token pair.

use crate::{CredentialStore, StorageKeys, VaultResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which storage backend a write lands in.
///
/// `Durable` survives process restarts; `Ephemeral` is scoped to the
/// current process. The remember-me decision selects a profile at write
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreProfile {
    Durable,
    Ephemeral,
}

impl StoreProfile {
    /// The other profile.
    pub fn opposite(self) -> Self {
        match self {
            StoreProfile::Durable => StoreProfile::Ephemeral,
            StoreProfile::Ephemeral => StoreProfile::Durable,
        }
    }
}

/// An access token and its paired refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Short-lived bearer credential for API calls.
    pub access: String,
    /// Longer-lived credential exchanged for a new pair.
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// Session metadata persisted next to the token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID from the auth gateway
    pub user_id: String,
    /// User email if known
    #[serde(default)]
    pub email: Option<String>,
    /// User role string as reported by the gateway
    #[serde(default)]
    pub role: Option<String>,
    /// When this pair was issued (ISO timestamp)
    pub issued_at: String,
}

impl SessionMeta {
    /// Build metadata stamped with the current time.
    pub fn now(user_id: impl Into<String>, email: Option<String>, role: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            role,
            issued_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Facade over the two storage profiles.
///
/// The pairing invariant is enforced here: tokens are only ever written by
/// [`TokenVault::store_pair`] and removed by [`TokenVault::clear_pair`] /
/// [`TokenVault::clear_all`], so a profile never holds exactly one half of
/// a pair.
pub struct TokenVault {
    durable: Box<dyn CredentialStore>,
    ephemeral: Box<dyn CredentialStore>,
}

impl TokenVault {
    /// Create a vault over the given backends.
    pub fn new(durable: Box<dyn CredentialStore>, ephemeral: Box<dyn CredentialStore>) -> Self {
        Self { durable, ephemeral }
    }

    fn store(&self, profile: StoreProfile) -> &dyn CredentialStore {
        match profile {
            StoreProfile::Durable => self.durable.as_ref(),
            StoreProfile::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    /// Write a token pair into the given profile.
    ///
    /// If the second write fails the first is rolled back so the profile
    /// is never left with a lone token.
    pub fn store_pair(&self, profile: StoreProfile, pair: &TokenPair) -> VaultResult<()> {
        let store = self.store(profile);
        store.set(StorageKeys::ACCESS_TOKEN, &pair.access)?;

        if let Err(e) = store.set(StorageKeys::REFRESH_TOKEN, &pair.refresh) {
            if let Err(rollback) = store.delete(StorageKeys::ACCESS_TOKEN) {
                warn!(error = %rollback, "Failed to roll back lone access token");
            }
            return Err(e);
        }

        debug!(profile = ?profile, "Token pair stored");
        Ok(())
    }

    /// Read the token pair from the given profile.
    ///
    /// Returns `None` unless both halves are present; a lone token is
    /// treated as no session.
    pub fn read_pair(&self, profile: StoreProfile) -> VaultResult<Option<TokenPair>> {
        let store = self.store(profile);
        let access = store.get(StorageKeys::ACCESS_TOKEN)?;
        let refresh = store.get(StorageKeys::REFRESH_TOKEN)?;

        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair { access, refresh })),
            (None, None) => Ok(None),
            _ => {
                warn!(profile = ?profile, "Lone token found, treating as no session");
                Ok(None)
            }
        }
    }

    /// Whether the given profile holds a complete pair.
    pub fn has_pair(&self, profile: StoreProfile) -> VaultResult<bool> {
        Ok(self.read_pair(profile)?.is_some())
    }

    /// Remove the token pair and metadata from the given profile.
    pub fn clear_pair(&self, profile: StoreProfile) -> VaultResult<()> {
        let store = self.store(profile);
        store.delete(StorageKeys::ACCESS_TOKEN)?;
        store.delete(StorageKeys::REFRESH_TOKEN)?;
        store.delete(StorageKeys::SESSION_META)?;
        debug!(profile = ?profile, "Token pair cleared");
        Ok(())
    }

    /// Remove tokens and metadata from both profiles.
    pub fn clear_all(&self) -> VaultResult<()> {
        self.clear_pair(StoreProfile::Durable)?;
        self.clear_pair(StoreProfile::Ephemeral)?;
        Ok(())
    }

    /// Persist session metadata into the given profile.
    pub fn set_session_meta(&self, profile: StoreProfile, meta: &SessionMeta) -> VaultResult<()> {
        let json = serde_json::to_string(meta)?;
        self.store(profile).set(StorageKeys::SESSION_META, &json)
    }

    /// Read session metadata from the given profile.
    pub fn session_meta(&self, profile: StoreProfile) -> VaultResult<Option<SessionMeta>> {
        match self.store(profile).get(StorageKeys::SESSION_META)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
