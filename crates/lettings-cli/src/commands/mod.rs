//! CLI command implementations.

mod auth;

pub use auth::{login, logout, register, run, status};

use anyhow::Result;
use lettings_config::{Config, Paths};
use lettings_gateway::HttpAuthGateway;
use lettings_session::{RefreshSettings, SessionController};
use lettings_vault::{FileStore, MemoryStore, TokenVault};
use std::sync::Arc;
use std::time::Duration;

/// Build a session controller wired to the configured gateway and the
/// on-disk credential file.
pub fn build_controller() -> Result<SessionController> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    // Validate the configured URL before handing it to the gateway
    let base_url = config.api_base_url()?;

    let durable = FileStore::open(paths.credentials_file())?;
    let vault = TokenVault::new(Box::new(durable), Box::new(MemoryStore::new()));
    let gateway = Arc::new(HttpAuthGateway::new(base_url.as_str()));

    Ok(SessionController::with_refresh_settings(
        gateway,
        vault,
        RefreshSettings {
            interval: Duration::from_secs(config.refresh_interval_secs),
        },
    ))
}
