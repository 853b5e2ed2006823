//! REST client for the lettings auth gateway.
//!
//! This crate owns the wire surface the session core consumes:
//! - Request/response types matching the backend's JSON shapes
//! - The [`AuthGateway`] trait the session controller is injected with
//! - [`HttpAuthGateway`], the `reqwest`-backed implementation

mod error;
mod http;
mod types;

pub use error::{GatewayError, GatewayResult};
pub use http::{AuthGateway, HttpAuthGateway};
pub use types::{AuthPayload, LoginRequest, RefreshPayload, RegisterRequest, Role, User};
