//! filedrop - command-line client for a filedrop file-sharing server.
//!
//! Every command runs through the shared `FileClient`, so an expired access
//! token is refreshed once and the command replayed without user action.

mod commands;
mod terminal;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use filedrop_core::{Config, FileClient, SessionFile};

use commands::{Command, Reported};
use terminal::{TerminalNavigator, TerminalNotifier};

/// Directory for an optional daily log file
const LOG_DIR_ENV: &str = "FILEDROP_LOG_DIR";

/// Initialize the tracing subscriber for logging
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=filedrop_core=debug).
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "filedrop.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !already_reported(&e) {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let store = SessionFile::new(config.cache_dir()?);
    let client = FileClient::from_config(&config, store)
        .notifier(Arc::new(TerminalNotifier))
        .navigator(Arc::new(TerminalNavigator))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
    info!(api_url = %config.base_url(), "filedrop starting");

    if !matches!(command, Command::Login(_) | Command::Register(_)) {
        // Restore the access token from the refresh cookie, if any
        client.initialize().await;
    }

    if command.requires_session() && !client.session().is_authenticated() {
        anyhow::bail!("Not logged in. Run `filedrop login` first.");
    }

    commands::run(command, &client, &mut config).await
}

/// Errors the notifier or the login prompt already printed.
fn already_reported(error: &anyhow::Error) -> bool {
    error.downcast_ref::<Reported>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedrop_core::ApiError;

    #[test]
    fn test_only_marked_errors_count_as_reported() {
        let shown = anyhow::Error::from(Reported(ApiError::NotFound("gone".into())));
        assert!(already_reported(&shown));

        let unshown = anyhow::Error::from(ApiError::Validation("bad body".into()));
        assert!(!already_reported(&unshown));

        assert!(!already_reported(&anyhow::anyhow!("Passwords do not match")));
    }
}
