//! YAML configuration file.
//!
//! Looked up from `--config`, then `pcrm-import.yaml` in the working
//! directory. Every key is optional; secrets may come from the environment
//! instead (`PCRM_API_KEY`, `GITHUB_TOKEN`).

use crate::executor::DEFAULT_TOLERATED_ERRORS;
use crate::transform::{TransformMode, DEFAULT_SUFFIX};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "pcrm-import.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub migration: MigrationConfig,
    pub import: ImportConfig,
    pub source: SourceConfig,
}

/// Remote SQL execution RPC
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Proxy/migration service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub suffix: String,
    pub batch_size: usize,
    pub delay_ms: u64,
    pub transform: TransformMode,
    pub lenient_quotes: bool,
    pub isolated_schema: Option<String>,
    pub tolerated_errors: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            batch_size: 1,
            delay_ms: 100,
            transform: TransformMode::Full,
            lenient_quotes: false,
            isolated_schema: None,
            tolerated_errors: DEFAULT_TOLERATED_ERRORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Source-control content API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_url: String,
    pub media_url: String,
    pub token: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            media_url: "https://media.githubusercontent.com/media".to_string(),
            token: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml_ng::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content)
    }

    /// Load the explicit file, or the default file if present, then apply
    /// environment overrides.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.endpoint.api_key.is_none() {
            self.endpoint.api_key = lookup("PCRM_API_KEY");
        }
        if self.endpoint.url.is_none() {
            self.endpoint.url = lookup("PCRM_ENDPOINT_URL");
        }
        if self.source.token.is_none() {
            self.source.token = lookup("GITHUB_TOKEN");
        }
    }
}
