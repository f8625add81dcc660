//! Process configuration: TOML file, environment overrides, defaults.
//!
//! Precedence: CLI flags (applied by the binary) > environment > config file > defaults.
//! The file is the first of `--config`, `$RESIK_CONFIG`, `./resik.toml` that is given.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::store::StoreOptions;

pub const CONFIG_ENV: &str = "RESIK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "resik.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// `DEBUG` enables debug-level console logging.
    pub mode: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self { name: "RESIK ARCH".into(), host: "0.0.0.0".into(), port: 6001, mode: "DEBUG".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory holding the write-ahead log; in-memory when unset.
    pub path: Option<PathBuf>,
    pub name: String,
    pub collection: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self { path: None, name: "resik".into(), collection: "todos".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for rolling log files; console only when unset.
    pub dir: Option<PathBuf>,
    pub level: String,
    /// Rolled files kept per log.
    pub retention: u32,
    /// A log4rs YAML file; replaces the programmatic setup when given.
    pub config_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7, config_file: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Per-request store deadline; 0 disables it.
    pub request_timeout_ms: u64,
    pub workers: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { request_timeout_ms: 30_000, workers: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub store: StoreSection,
    pub log: LogConfig,
    pub server: ServerSection,
}

impl AppConfig {
    /// # Errors
    /// `Parse` for malformed TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads from the process environment and working directory.
    ///
    /// # Errors
    /// Unreadable or malformed config file, or an unparsable environment value.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(cli_path, &cwd, |k| std::env::var(k).ok())
    }

    /// Like [`AppConfig::load`] with an explicit working directory and environment lookup.
    ///
    /// # Errors
    /// See [`AppConfig::load`].
    pub fn load_with<F>(cli_path: Option<&Path>, cwd: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match cli_path {
            Some(p) => Some(p.to_path_buf()),
            None => env(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| Some(cwd.join(DEFAULT_CONFIG_FILE)).filter(|p| p.exists())),
        };
        let mut cfg = match file {
            Some(path) => {
                let text =
                    std::fs::read_to_string(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env(env)?;
        Ok(cfg)
    }

    /// # Errors
    /// `Invalid` when `APP_PORT` or `REQUEST_TIMEOUT_MS` is not a number.
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("APP_NAME") {
            self.app.name = v;
        }
        if let Some(v) = env("APP_HOST") {
            self.app.host = v;
        }
        if let Some(v) = env("APP_PORT") {
            self.app.port = v.parse().map_err(|_| ConfigError::Invalid { key: "APP_PORT", value: v })?;
        }
        if let Some(v) = env("MODE") {
            self.app.mode = v;
        }
        if let Some(v) = env("STORE_PATH") {
            self.store.path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("LOG_DIR") {
            self.log.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env("LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = env("REQUEST_TIMEOUT_MS") {
            self.server.request_timeout_ms =
                v.parse().map_err(|_| ConfigError::Invalid { key: "REQUEST_TIMEOUT_MS", value: v })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.app.mode.eq_ignore_ascii_case("debug")
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.server.request_timeout_ms > 0).then(|| Duration::from_millis(self.server.request_timeout_ms))
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions { path: self.store.path.clone(), name: self.store.name.clone() }
    }
}
