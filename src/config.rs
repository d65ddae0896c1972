//! # Application Configuration
//!
//! [`AppConfig`] holds every setting the framework reads. It can be built
//! in code, loaded from YAML, and overridden from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `FLAGON_DEBUG` | `debug` (`1`/`true`/`yes`/`on`) |
//! | `FLAGON_SECRET_KEY` | `secret_key` |
//! | `FLAGON_TEMPLATE_DIR` | `template_dir` |
//! | `FLAGON_STACK_SIZE` | `stack_size`, decimal or `0x` hex |
//!
//! ## YAML
//!
//! ```yaml
//! debug: false
//! secret_key: "change me"
//! session_cookie_name: session
//! template_dir: templates
//! ```
//!
//! Missing keys take their defaults.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default coroutine stack size (64 KB); templates recurse deeper than
/// plain handlers.
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Debug mode: generic failures are never given to the 500 handler
    pub debug: bool,
    /// Signing key for the session cookie; no key means no session
    pub secret_key: Option<String>,
    pub session_cookie_name: String,
    pub session_cookie_path: String,
    pub session_cookie_httponly: bool,
    /// Directory templates are loaded from
    pub template_dir: Option<PathBuf>,
    /// URL prefix of the build-only `static` rule
    pub static_path: String,
    /// In debug mode, leave the context on the stack when a request fails
    pub preserve_context_on_exception: bool,
    /// Coroutine stack size in bytes
    pub stack_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            secret_key: None,
            session_cookie_name: "session".to_string(),
            session_cookie_path: "/".to_string(),
            session_cookie_httponly: true,
            template_dir: None,
            static_path: "/static".to_string(),
            preserve_context_on_exception: true,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Configuration loading error
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_yaml::Error),
    InvalidValue { variable: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "invalid value '{value}' for {variable}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Malformed YAML or wrongly typed values.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::Parse)
    }

    /// # Errors
    ///
    /// Unreadable file, malformed YAML or wrongly typed values.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults with environment overrides applied.
    ///
    /// # Errors
    ///
    /// An override that cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// # Errors
    ///
    /// An override that cannot be parsed.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup.
    ///
    /// # Errors
    ///
    /// An override that cannot be parsed.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("FLAGON_DEBUG") {
            self.debug = parse_bool("FLAGON_DEBUG", &val)?;
        }
        if let Some(val) = lookup("FLAGON_SECRET_KEY") {
            self.secret_key = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = lookup("FLAGON_TEMPLATE_DIR") {
            self.template_dir = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("FLAGON_STACK_SIZE") {
            self.stack_size = parse_size("FLAGON_STACK_SIZE", &val)?;
        }
        Ok(self)
    }
}

fn invalid(variable: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        variable: variable.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(variable: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(variable, value)),
    }
}

fn parse_size(variable: &str, value: &str) -> Result<usize, ConfigError> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| invalid(variable, value))
}
