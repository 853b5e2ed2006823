//! Storage key constants.

/// Storage keys used by the session client
pub struct StorageKeys;

impl StorageKeys {
    /// Access token (short-lived bearer credential)
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token (long-lived, exchanged for a new pair)
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Session metadata (JSON)
    pub const SESSION_META: &'static str = "session_meta";
}
