//! Logging setup for binaries.
//!
//! The library only emits `tracing` events; installing a subscriber is up
//! to the binary. [`init_logging`] installs a `tracing-subscriber` fmt layer
//! behind an `EnvFilter`.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `RUST_LOG` | full filter, wins over everything below | unset |
//! | `FLAGON_LOG_LEVEL` | level for the `flagon` target | `info` |
//! | `FLAGON_LOG_FORMAT` | `pretty` or `json` | `pretty` |
//! | `FLAGON_LOG_FILTER` | extra comma-separated directives | unset |

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("FLAGON_LOG_LEVEL") {
            config.level = level;
        }
        if let Ok(format) = std::env::var("FLAGON_LOG_FORMAT") {
            config.format = if format.eq_ignore_ascii_case("json") {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            };
        }
        config.target_filter = std::env::var("FLAGON_LOG_FILTER").ok();
        config
    }

    /// Directive string used when `RUST_LOG` is not set.
    #[must_use]
    pub fn directives(&self) -> String {
        let level = match self.level.to_ascii_lowercase().as_str() {
            l @ ("trace" | "debug" | "info" | "warn" | "error") => l.to_string(),
            _ => "info".to_string(),
        };
        let mut directives = format!("warn,flagon={level},may_minihttp::http_server=warn");
        if let Some(extra) = &self.target_filter {
            for d in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                directives.push(',');
                directives.push_str(d);
            }
        }
        directives
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// A subscriber is already installed, or a filter directive is invalid.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.directives()).context("Invalid log filter directive")?,
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}
