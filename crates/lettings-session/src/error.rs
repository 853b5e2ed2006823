//! Session error types.

use thiserror::Error;

/// Error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Gateway call failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] lettings_gateway::GatewayError),

    /// Credential storage failed
    #[error("Storage error: {0}")]
    Vault(#[from] lettings_vault::VaultError),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// No live session
    #[error("Not logged in")]
    NotLoggedIn,
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
