//! Logging initialization for the session client.
//!
//! All binaries share one tracing setup: a compact stderr writer with the
//! level taken from `RUST_LOG` when set, falling back to the configured
//! default.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Default log level (trace, debug, info, warn, error)
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("Client started");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    // Tests may initialize more than once; keep the first subscriber.
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Logging already initialized, keeping existing subscriber");
    }
}
