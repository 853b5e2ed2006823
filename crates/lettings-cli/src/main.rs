//! Lettings CLI - command-line client for the lettings session service.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use lettings_config::{Config, Paths};

/// Lettings CLI - manage your lettings session from the terminal.
#[derive(Parser)]
#[command(name = "lettings")]
#[command(about = "Lettings CLI for session and account management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the
    /// configured level when omitted
    #[arg(long, global = true)]
    log_level: Option<String>,
}

/// Pick the log level: an explicit flag wins over the configured one.
fn resolve_log_level(flag: Option<&str>, config: Option<&Config>) -> String {
    if let Some(level) = flag {
        return level.to_string();
    }
    config
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|| lettings_config::DEFAULT_LOG_LEVEL.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Persist the session across restarts
        #[arg(short, long)]
        remember: bool,
    },

    /// Register a new account
    Register,

    /// Check session status
    Status,

    /// Logout and clear stored credentials
    Logout,

    /// Run in the foreground with the token refresh loop armed
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = Paths::new().and_then(|paths| Config::load(&paths)).ok();
    lettings_config::init_logging(&resolve_log_level(
        cli.log_level.as_deref(),
        config.as_ref(),
    ));

    let result = match cli.command {
        Commands::Login { remember } => commands::login(remember, &cli.format).await,
        Commands::Register => commands::register(&cli.format).await,
        Commands::Status => commands::status(&cli.format).await,
        Commands::Logout => commands::logout(&cli.format).await,
        Commands::Run => commands::run(&cli.format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
