//! Core configuration and utilities for the lettings session client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_REFRESH_INTERVAL_SECS};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
