//! Logging configuration using tracing
//!
//! Everything goes to a daily rolling file; stdout belongs to the NDJSON
//! event stream. SDK callbacks arrive on threads the SDK names
//! (`sdk-register`, `sdk-events`), so thread names are part of every line.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "DJICONNECT_LOG";

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV_VAR: &str = "DJICONNECT_LOG_DIR";

/// Filter used when `DJICONNECT_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "djiconnect=info,djiconnect_app=info,djiconnect_sdk=info,warn";

const LOG_FILE_PREFIX: &str = "djiconnect.log";

/// Where logs go and what gets through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub directory: PathBuf,
    pub filter: String,
}

impl LogConfig {
    /// Resolve from `DJICONNECT_LOG`, `DJICONNECT_LOG_DIR` and the platform
    /// data directory
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var(LOG_ENV_VAR).ok(),
            std::env::var_os(LOG_DIR_ENV_VAR).map(PathBuf::from),
            dirs::data_local_dir(),
        )
    }

    fn resolve(
        filter: Option<String>,
        directory: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> Self {
        let filter = filter
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let directory = directory.unwrap_or_else(|| {
            data_dir
                .unwrap_or_else(|| PathBuf::from("."))
                .join("djiconnect")
                .join("logs")
        });
        Self { directory, filter }
    }

    /// Path of the file the appender writes today's lines to
    pub fn current_log_file(&self) -> PathBuf {
        self.directory.join(LOG_FILE_PREFIX)
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|e| {
            eprintln!("Invalid {} '{}': {}", LOG_ENV_VAR, self.filter, e);
            EnvFilter::new(DEFAULT_FILTER)
        })
    }
}

/// Initialize logging from the environment
///
/// # Examples
/// ```bash
/// DJICONNECT_LOG=debug djiconnect
/// DJICONNECT_LOG=djiconnect_app::aggregator=trace djiconnect --scenario flaky.toml
/// DJICONNECT_LOG_DIR=/tmp/djiconnect-logs djiconnect
/// ```
pub fn init() -> Result<LogConfig> {
    let config = LogConfig::from_env();
    init_with(&config)?;
    Ok(config)
}

/// Install the global subscriber for `config`
pub fn init_with(config: &LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, &config.directory, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    log_banner(&config.directory, &config.filter);
    Ok(())
}

fn log_banner(directory: &Path, filter: &str) {
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("djiconnect {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {}", directory.display());
    tracing::info!("Filter: {}", filter);
    tracing::info!("═══════════════════════════════════════════════════════");
}
