// src/config/loader.rs
//! Layered configuration loading
//!
//! Layers, later ones winning: built-in defaults, each configuration file in
//! order (missing files are skipped), then environment variables such as
//! `EMG__SAMPLING_RATE_HZ` or `EMG__BATCH__THREADS`.

use crate::config::{constants::paths, EmgConfig};
use crate::error::{EmgError, EmgResult, IoResultExt};
use ::config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader over files and the environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Loader over the default file locations
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Loader over custom paths, in increasing precedence
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Merge every layer and validate the result
    pub fn load(&self) -> EmgResult<EmgConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&EmgConfig::default())?);

        for path in &self.config_paths {
            if path.exists() {
                debug!(path = %path.display(), "adding configuration file");
            }
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator(paths::ENV_SEPARATOR)
                .separator(paths::ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: EmgConfig = builder.build()?.try_deserialize()?;
        config
            .validate_consistency()
            .map_err(|errors| EmgError::Config(errors.join("; ")))?;

        info!(
            sampling_rate_hz = config.sampling_rate_hz,
            stages = config.stages.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate a single file without layering
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> EmgResult<EmgConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).at_path(path)?;
        let config: EmgConfig =
            toml::from_str(&content).map_err(|e| EmgError::Config(format!("{}: {}", path.display(), e)))?;
        config
            .validate_consistency()
            .map_err(|errors| EmgError::Config(errors.join("; ")))?;
        Ok(config)
    }

    /// Write a configuration as TOML
    pub fn export_config<P: AsRef<Path>>(&self, config: &EmgConfig, path: P) -> EmgResult<()> {
        let path = path.as_ref();
        let toml_content = toml::to_string_pretty(config).map_err(|e| EmgError::Config(e.to_string()))?;
        std::fs::write(path, toml_content).at_path(path)?;
        Ok(())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ]
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
