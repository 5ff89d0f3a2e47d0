use crate::error::AppError;
use crate::ledger::DeletePolicy;
use crate::model::{CookieOffer, default_catalog};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "COOKIEJAR_CONFIG_PATH";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub delete_policy: DeletePolicy,
    /// Cookie shop catalog; empty means the built-in catalog.
    #[serde(default)]
    pub cookies: Vec<CookieOffer>,
}

impl Config {
    pub fn catalog(&self) -> Vec<CookieOffer> {
        if self.cookies.is_empty() {
            default_catalog()
        } else {
            self.cookies.clone()
        }
    }

    pub fn find_offer(&self, name: &str) -> Option<CookieOffer> {
        let wanted = name.trim();
        self.catalog()
            .into_iter()
            .find(|offer| offer.name.eq_ignore_ascii_case(wanted))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub delete_policy: Option<DeletePolicy>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("cookiejar")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cookiejar")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => {
            debug!(error = %err, "config path unavailable, using defaults");
            ConfigLoad {
                config: Config::default(),
                error: Some(err),
            }
        }
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => {
            debug!(path = %path.display(), error = %err, "invalid config, using defaults");
            ConfigLoad {
                config: Config::default(),
                error: Some(err),
            }
        }
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::invalid_data(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    if let Some(offer) = config.cookies.iter().find(|offer| offer.price < 0) {
        return Err(AppError::invalid_data(format!(
            "{}: cookie '{}' has a negative price",
            path.display(),
            offer.name
        )));
    }
    Ok(config)
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(policy) = overrides.delete_policy {
        merged.delete_policy = policy;
    }

    merged
}
