use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::error::{MergeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_SKIN_DATA_URL.to_string(),
            timeout_seconds: constants::DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: constants::DEFAULT_THREADS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            prefix: constants::DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file does not exist.
    /// Environment overrides are applied on top of whatever was loaded.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                MergeError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(constants::ENV_SKIN_DATA_URL) {
            if !url.trim().is_empty() {
                self.resolver.url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolver.url.trim().is_empty() {
            return Err(MergeError::Config("resolver.url must not be empty".to_string()));
        }
        if self.resolver.timeout_seconds == 0 {
            return Err(MergeError::Config(
                "resolver.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.threads < 1 {
            return Err(MergeError::InvalidConcurrency(self.pipeline.threads));
        }
        Ok(())
    }
}
