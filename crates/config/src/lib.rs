//! TaskSync Configuration System
//!
//! Settings live in a TOML file in the platform config directory. Each
//! section implements `ConfigSection`, so it validates and merges itself.
//!
//! - **Graceful degradation**: a file that fails validation still loads, with warnings
//! - **Atomic writes**: config files are never left half-written
//! - **Environment overrides**: `TASKSYNC_<SECTION>_<FIELD>` beats the file
//!
//! # Example
//!
//! ```rust,no_run
//! use tasksync_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Database: {}", config.server.database_path.display());
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod server_config;
pub mod sync_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use validation::{Checks, ConfigSection};

pub use server_config::{LogLevel, ServerConfig};
pub use sync_config::SyncConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Storage and process settings
    pub server: ServerConfig,

    /// Sync engine limits
    pub sync: SyncConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut checks = Checks::new();

        if self.version > CONFIG_VERSION {
            checks.fail(ValidationError::with_value(
                "version",
                format!("is newer than the supported version {}", CONFIG_VERSION),
                self.version,
            ));
        }

        checks
            .extend(self.server.validate())
            .extend(self.sync.validate())
            .finish()
    }

    /// Renders the config as it would be saved
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merges this config with another, preferring values from `other`
    ///
    /// Override chain: defaults < file < env vars < CLI args
    pub fn merge(&mut self, other: Config) {
        self.server.merge(other.server);
        self.sync.merge(other.sync);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}
