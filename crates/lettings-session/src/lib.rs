//! Session lifecycle for the lettings client.
//!
//! This crate provides:
//! - An explicit FSM for authentication state
//! - [`SessionController`]: restore/login/register/logout plus the
//!   background token refresh loop
//! - A state-change callback surface for role-based redirect consumers

mod controller;
mod error;
mod fsm;

pub use controller::{
    RefreshSettings, SessionCallback, SessionController, SessionSnapshot,
};
pub use error::{SessionError, SessionResult};
pub use fsm::session_machine;
pub use fsm::{
    SessionEvent, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
