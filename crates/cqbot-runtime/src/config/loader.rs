//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. `cqbot.toml`, the first one found in the working directory or
//!    `<user config dir>/cqbot`
//! 4. Variables from a `.env` file, loaded into the process environment
//! 5. Environment variables (`CQ_*`)
//!
//! # Environment Variable Mapping
//!
//! The prefix is stripped and `__` separates nested keys:
//!
//! - `CQ_HOST=127.0.0.1` → `host = "127.0.0.1"`
//! - `CQ_ACCESS_TOKEN=xxx` → `access_token = "xxx"`
//! - `CQ_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use cqbot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//!
//! let config = ConfigLoader::new()
//!     .file("./deploy/cqbot.toml")
//!     .without_dotenv()
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::CqConfig;
use super::validation::validate_config;

/// File name searched for in each search path.
pub const CONFIG_FILE_NAME: &str = "cqbot.toml";

/// Prefix of the environment variables read by default.
pub const ENV_PREFIX: &str = "CQ_";

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    env_prefix: String,
    /// `None` disables the `.env` step.
    dotenv_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            env_prefix: ENV_PREFIX.to_string(),
            dotenv_file: Some(PathBuf::from(".env")),
        }
    }

    /// Adds a search path for `cqbot.toml`. Replaces the default paths.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables environment variables and the `.env` file.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Reads variables from this file instead of `./.env`.
    pub fn dotenv<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dotenv_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_dotenv(mut self) -> Self {
        self.dotenv_file = None;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: CqConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<CqConfig> {
        let figment = self.build_figment()?;
        let config: CqConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            host = %config.host,
            port = config.port,
            data = %config.data.display(),
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CqConfig::default()))
            .merge(std::mem::take(&mut self.figment));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else if let Some(path) = self.find_config_file() {
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            debug!("No configuration file found, using defaults");
        }

        if self.load_env {
            if let Some(path) = &self.dotenv_file {
                load_dotenv(path)?;
            }
            trace!(prefix = %self.env_prefix, "Loading environment variables");
            figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));
        }

        Ok(figment)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        self.resolve_search_paths()
            .into_iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|path| path.exists())
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("cqbot"));
        }
        paths
    }
}

/// Loads `path` into the process environment if it exists.
///
/// Variables already set in the environment win over the file.
fn load_dotenv(path: &Path) -> ConfigResult<()> {
    if !path.exists() {
        return Ok(());
    }
    dotenvy::from_path(path).map_err(|e| ConfigError::Dotenv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(path = %path.display(), "Loaded .env file");
    Ok(())
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CqConfig> {
    ConfigLoader::new().load()
}
