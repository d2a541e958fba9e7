//! Shared configuration for vmesh processes.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `VMESH_`-prefixed environment variables (`VMESH_STORE__ROOT`,
//! `VMESH_AGENT__HOST_ID`, ... — `__` separates nesting levels). Later
//! layers win.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default config file name, looked up in the working directory when no
/// explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "vmesh.toml";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load configuration: {0}")]
    Load(Box<figment::Error>),

    #[error("invalid configuration: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("could not render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Root configuration shared by every vmesh process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreSettings,
    pub agent: AgentSettings,
    pub log: LogSettings,
}

/// Coordination-store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Which backend to construct.
    pub backend: StoreBackend,

    /// Root prefix for every vmesh node.
    pub root: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            root: "/vmesh".to_owned(),
        }
    }
}

/// Selectable store backends.
///
/// `Memory` is the in-process reference backend — suitable for tests and
/// local development only; its state dies with the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
}

/// Host-agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// This host's identity. Generated (and logged) when unset.
    pub host_id: Option<Uuid>,

    /// Delay before re-scanning the command queue after a lost watch,
    /// in seconds.
    pub rescan_delay_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            host_id: None,
            rescan_delay_secs: 5,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Tracing filter directive, e.g. `info` or `vmesh_agent=debug`.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load configuration: defaults ← TOML file ← `VMESH_` environment.
///
/// When `path` is `None` the default file is merged only if it exists;
/// an explicitly named file that is missing is an error.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(explicit) = path {
        if !explicit.exists() {
            return Err(ConfigError::Validation {
                field: "config".to_owned(),
                reason: format!("file not found: {}", explicit.display()),
            });
        }
    }
    let file = path.map_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), Path::to_path_buf);

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed("VMESH_").split("__"))
        .extract()?;

    validate(&config)?;
    Ok(config)
}

/// Render a config back to TOML (for `--write-default-config` style
/// tooling and tests).
pub fn to_toml(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.store.root.starts_with('/') {
        return Err(ConfigError::Validation {
            field: "store.root".to_owned(),
            reason: format!("must be an absolute path, got '{}'", config.store.root),
        });
    }
    if config.store.root.len() > 1 && config.store.root.ends_with('/') {
        return Err(ConfigError::Validation {
            field: "store.root".to_owned(),
            reason: "must not end with '/'".to_owned(),
        });
    }
    Ok(())
}
