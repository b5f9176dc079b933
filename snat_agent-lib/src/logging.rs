use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILTER: &str = "info";
pub const ENV_VAR_LOG_FILE: &str = "SNAT_AGENT_LOG_FILE";

/// Initializes the global `tracing` subscriber writing to the file at `log_path`.
///
/// The file is opened (or created) in append mode and ANSI colors are disabled.
/// Verbosity is read from `RUST_LOG`, defaulting to `"info"`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn setup_log_file(log_path: &Path) -> Result<(), io::Error> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(filter)
        .init();
    tracing::debug!("logging initialized with file output: {}", log_path.display());
    Ok(())
}

/// Initializes the global `tracing` subscriber with stdout logging.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn setup_stdout() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(filter)
        .init();
    tracing::debug!("logging initialized with stdout/stderr output");
}
