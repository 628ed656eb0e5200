//! Configuration loading
//!
//! Resolution order: explicit path, `./config/recipe-box.yaml`, the user's
//! config directory, then built-in defaults. Environment variables override
//! whatever was loaded.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use recipe_box_recipes::{SyncPolicy, VisibilityMode, MAX_EVENT_CAPACITY};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const LOCAL_CONFIG_PATH: &str = "config/recipe-box.yaml";
pub const CONFIG_DIR_NAME: &str = "recipe-box";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

pub const ENV_LOG_LEVEL: &str = "RECIPE_BOX_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "RECIPE_BOX_LOG_JSON";
pub const ENV_VISIBILITY: &str = "RECIPE_BOX_VISIBILITY";
pub const ENV_EVENT_CAPACITY: &str = "RECIPE_BOX_EVENT_CAPACITY";

const FILE_EVENT_CAPACITY: &str = "sync.event_capacity";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncPolicy,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize config: {0}")]
    Deserialize(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidOverride { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// File the values came from; `None` when running on defaults.
    pub source: Option<PathBuf>,
}

/// Accepts JSON or YAML. An empty document yields the defaults.
pub fn parse_config_str(raw: &str) -> Result<AppConfig, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = match serde_json::from_str(raw) {
        Ok(config) => config,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        })?,
    };
    check_event_capacity(FILE_EVENT_CAPACITY, config.sync.event_capacity)?;
    Ok(config)
}

fn check_event_capacity(key: &'static str, capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 || capacity > MAX_EVENT_CAPACITY {
        return Err(ConfigError::InvalidOverride {
            key,
            reason: format!("must be between 1 and {MAX_EVENT_CAPACITY}, got {capacity}"),
        });
    }
    Ok(())
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&raw)
}

/// Picks the file `load_config` would read, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    user.exists().then_some(user)
}

pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let source = resolve_config_path(explicit);
    let mut config = match &source {
        Some(path) => {
            let config = load_config_from_path(path)?;
            info!(path = %path.display(), "loaded configuration");
            config
        }
        None => {
            warn!("no configuration file found; using defaults");
            AppConfig::default()
        }
    };
    apply_env_overrides(&mut config)?;
    Ok(LoadedConfig { config, source })
}

pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    apply_overrides(config, |key| env::var(key).ok())
}

/// Applies overrides from any key lookup; blank values are ignored.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.logging.level = level.trim().to_string();
    }
    if let Some(raw) = get(ENV_LOG_JSON) {
        config.logging.json = raw
            .trim()
            .parse::<bool>()
            .map_err(|err| ConfigError::InvalidOverride {
                key: ENV_LOG_JSON,
                reason: err.to_string(),
            })?;
    }
    if let Some(raw) = get(ENV_VISIBILITY) {
        config.sync.visibility = raw
            .parse::<VisibilityMode>()
            .map_err(|reason| ConfigError::InvalidOverride {
                key: ENV_VISIBILITY,
                reason,
            })?;
    }
    if let Some(raw) = get(ENV_EVENT_CAPACITY) {
        let capacity = raw
            .trim()
            .parse::<usize>()
            .map_err(|err| ConfigError::InvalidOverride {
                key: ENV_EVENT_CAPACITY,
                reason: err.to_string(),
            })?;
        check_event_capacity(ENV_EVENT_CAPACITY, capacity)?;
        config.sync.event_capacity = capacity;
    }
    Ok(())
}
