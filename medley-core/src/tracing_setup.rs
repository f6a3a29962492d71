//! Log output for the `medley` binary.
//!
//! Stderr gets the level chosen with `--log-level`, or the directives in
//! `MEDLEY_LOG` when set. Every run also rewrites `medley-last-run.log` with
//! Medley's own spans at TRACE, which is where per-host upstream attempts,
//! slice timeouts and payload shape mismatches end up.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Environment variable holding console filter directives.
pub const LOG_ENV_VAR: &str = "MEDLEY_LOG";

/// Name of the per-run debug log inside the logs directory.
pub const LOG_FILE_NAME: &str = "medley-last-run.log";

/// HTTP stack crates that drown out resolution logs below WARN.
const NOISY_DEPENDENCIES: [&str; 3] = ["hyper_util", "reqwest", "h2"];

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("Failed to prepare log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Global tracing subscriber already installed: {reason}")]
    AlreadyInstalled { reason: String },
}

/// Installs the stderr and debug-file layers and returns the log file path.
///
/// `logs_dir` defaults to `./logs`.
///
/// # Errors
///
/// - `TracingSetupError::LogFile` - Logs directory or file could not be created
/// - `TracingSetupError::AlreadyInstalled` - A global subscriber was set earlier
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> Result<PathBuf, TracingSetupError> {
    let log_file_path = prepare_log_file_path(logs_dir)?;
    let log_file = File::create(&log_file_path).map_err(|source| TracingSetupError::LogFile {
        path: log_file_path.clone(),
        source,
    })?;

    let console_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(console_directives(console_level)));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(file_directives()));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TracingSetupError::AlreadyInstalled {
            reason: e.to_string(),
        })?;

    tracing::debug!("Logging to stderr at {console_level}, full trace in {}", log_file_path.display());
    Ok(log_file_path)
}

/// `level` for Medley, capped at WARN for the HTTP stack.
fn console_directives(level: Level) -> String {
    let mut directives = level.to_string().to_lowercase();
    if level > Level::WARN {
        for dependency in NOISY_DEPENDENCIES {
            directives.push_str(&format!(",{dependency}=warn"));
        }
    }
    directives
}

/// Medley crates at TRACE, everything else at DEBUG.
fn file_directives() -> String {
    ["debug", "medley=trace", "medley_core=trace", "medley_search=trace", "medley_cli=trace"].join(",")
}

fn prepare_log_file_path(logs_dir: Option<&Path>) -> Result<PathBuf, TracingSetupError> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path).map_err(|source| TracingSetupError::LogFile {
        path: logs_path.to_path_buf(),
        source,
    })?;
    Ok(logs_path.join(LOG_FILE_NAME))
}

/// Values accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    /// Adds one line per resolved query
    Info,
    /// Adds fallback decisions and soft failures
    Debug,
    /// Adds every upstream host attempt
    Trace,
}

impl CliLogLevel {
    /// # Examples
    /// ```
    /// use medley_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Info.as_tracing_level(), tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}
