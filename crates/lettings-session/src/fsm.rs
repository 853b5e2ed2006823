//! Session state machine using rust-fsm.
//!
//! Authentication state is tracked explicitly rather than derived from
//! storage checks: every operation drives a begin/success/failure
//! transition, and an operation attempted in the wrong state is rejected
//! instead of silently racing.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    LoggedOut    │ (initial)
//! └────────┬────────┘
//!          │ RestoreStarted / LoginStarted / RegisterStarted
//!          ▼
//! ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐
//! │    Restoring    │   │    LoggingIn    │   │   Registering   │
//! └────────┬────────┘   └────────┬────────┘   └────────┬────────┘
//!          │ *Succeeded          │ *Succeeded          │ *Succeeded
//!          │ (or *Failed back    │                     │
//!          │  to LoggedOut)      ▼                     │
//!          └─────────────►┌─────────────┐◄─────────────┘
//!                         │  LoggedIn   │
//!                         └──────┬──────┘
//!             RefreshStarted     │     LogoutStarted
//!          ┌─────────────────────┴──────────────────┐
//!          ▼                                        ▼
//! ┌─────────────────┐                      ┌─────────────────┐
//! │   Refreshing    │                      │   LoggingOut    │
//! └────────┬────────┘                      └────────┬────────┘
//!          │ RefreshSucceeded -> LoggedIn           │ LogoutFinished
//!          │ RefreshFailed    -> LoggedOut          ▼
//!          │ LogoutStarted    -> LoggingOut    LoggedOut
//!          └───────────────────────────────►   LoggedOut
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Declarative FSM definition. The macro generates a module
// `session_machine` with State, Input, and StateMachine types.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(LoggedOut)

    LoggedOut => {
        RestoreStarted => Restoring,
        LoginStarted => LoggingIn,
        RegisterStarted => Registering
    },
    Restoring => {
        RestoreSucceeded => LoggedIn,
        RestoreFailed => LoggedOut
    },
    LoggingIn => {
        LoginSucceeded => LoggedIn,
        LoginFailed => LoggedOut
    },
    Registering => {
        RegisterSucceeded => LoggedIn,
        RegisterFailed => LoggedOut
    },
    LoggedIn => {
        RefreshStarted => Refreshing,
        LogoutStarted => LoggingOut
    },
    Refreshing => {
        RefreshSucceeded => LoggedIn,
        RefreshFailed => LoggedOut,
        // Logout can race an in-flight refresh tick
        LogoutStarted => LoggingOut
    },
    LoggingOut => {
        LogoutFinished => LoggedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
///
/// A simplified view of the FSM state for UI and redirect decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No live session.
    LoggedOut,
    /// Attempting silent restore from stored credentials.
    Restoring,
    /// Login call in flight.
    LoggingIn,
    /// Registration call in flight.
    Registering,
    /// Logged in with a live token pair.
    LoggedIn,
    /// Background refresh tick in flight.
    Refreshing,
    /// Logout in progress.
    LoggingOut,
}

impl SessionState {
    /// Returns true if the user has a live session (LoggedIn only).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::LoggedIn)
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionState::Restoring
                | SessionState::LoggingIn
                | SessionState::Registering
                | SessionState::Refreshing
                | SessionState::LoggingOut
        )
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::LoggedOut => SessionState::LoggedOut,
            SessionMachineState::Restoring => SessionState::Restoring,
            SessionMachineState::LoggingIn => SessionState::LoggingIn,
            SessionMachineState::Registering => SessionState::Registering,
            SessionMachineState::LoggedIn => SessionState::LoggedIn,
            SessionMachineState::Refreshing => SessionState::Refreshing,
            SessionMachineState::LoggingOut => SessionState::LoggingOut,
        }
    }
}

/// Payload for session state change events.
///
/// Consumers use `role` with [`lettings_gateway::Role::landing_route`] to
/// route an authenticated user to their dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Current session state.
    pub state: SessionState,
    /// User ID if logged in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// User role if logged in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<lettings_gateway::Role>,
}
