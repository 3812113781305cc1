//! Configuration loading and typed config structures for the Hearsay engine.
//!
//! The canonical configuration lives in `hearsay-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads the file. Every field has a default, so an empty or
//! missing file yields a working configuration.

use std::path::{Path, PathBuf};

use hearsay_rumor::{DecayConfig, KnowledgeConfig, PropagationConfig};
use serde::Deserialize;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "HEARSAY_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "hearsay-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value for {key}: {value}")]
    InvalidOverride {
        /// The environment variable.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `hearsay-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HearsayConfig {
    /// Spread and mutation settings.
    #[serde(default)]
    pub propagation: PropagationConfig,

    /// Decay sweep settings.
    #[serde(default)]
    pub decay: DecayConfig,

    /// Spatial knowledge settings.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Snapshot persistence.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Rumor notification delivery.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Content mutation backend.
    #[serde(default)]
    pub mutator: MutatorConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HearsayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `HEARSAY_NATS_URL` overrides `notifications.nats_url`
    /// - `HEARSAY_PORT` overrides `server.port`
    /// - `HEARSAY_MUTATOR_API_KEY` overrides `mutator.api_key`
    /// - `HEARSAY_SNAPSHOT_PATH` overrides `storage.snapshot_path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for a malformed override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file), except for `NotFound`.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The config file path from `HEARSAY_CONFIG`, or the default.
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty string yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `HEARSAY_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `HEARSAY_PORT` is not a port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("HEARSAY_NATS_URL") {
            self.notifications.nats_url = Some(val);
        }
        if let Some(val) = lookup("HEARSAY_PORT") {
            self.server.port = val.trim().parse().map_err(|_parse| ConfigError::InvalidOverride {
                key: "HEARSAY_PORT",
                value: val.clone(),
            })?;
        }
        if let Some(val) = lookup("HEARSAY_MUTATOR_API_KEY") {
            self.mutator.api_key = val;
        }
        if let Some(val) = lookup("HEARSAY_SNAPSHOT_PATH") {
            self.storage.snapshot_path = Some(PathBuf::from(val));
        }
        Ok(())
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Where to load and save the rumor snapshot. `None` keeps rumors in
    /// memory only.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationConfig {
    /// NATS server URL. `None` disables external notifications.
    #[serde(default)]
    pub nats_url: Option<String>,

    /// Subject prefix; notifications go to `{prefix}.rumors.{entity_id}`.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            nats_url: None,
            subject_prefix: default_subject_prefix(),
        }
    }
}

/// Which content mutation backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutatorBackendKind {
    /// Deterministic local garbling; no network.
    #[default]
    Local,
    /// `OpenAI`-compatible chat completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// Content mutation backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MutatorConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: MutatorBackendKind,

    /// Base API URL (e.g. `https://api.openai.com/v1`).
    #[serde(default)]
    pub api_url: String,

    /// Model identifier.
    #[serde(default)]
    pub model: String,

    /// API key. Prefer `HEARSAY_MUTATOR_API_KEY` over the file.
    #[serde(default)]
    pub api_key: String,

    /// Directory holding `mutation.j2`. `None` uses the built-in template.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Sampling temperature (default: 0.9).
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            backend: MutatorBackendKind::default(),
            api_url: String::new(),
            model: String::new(),
            api_key: String::new(),
            templates_dir: None,
            temperature: default_temperature(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_subject_prefix() -> String {
    String::from("hearsay")
}

const fn default_temperature() -> f64 {
    0.9
}

fn default_log_level() -> String {
    String::from("info")
}
