//! Server-level configuration section

use crate::validation::{Checks, ConfigSection, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Log level for process logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(ValidationError::with_value(
                "server.log_level",
                "must be one of: error, warn, info, debug, trace",
                s,
            )),
        }
    }
}

/// Storage and process settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Database file path (relative to the config dir if not absolute)
    pub database_path: PathBuf,

    /// Maximum pooled database connections
    pub max_connections: u32,

    /// Use SQLite write-ahead logging
    pub enable_wal: bool,

    /// How long a write waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,

    /// Log level for process output
    pub log_level: LogLevel,

    /// Identities whose accounts are created at startup
    pub accounts: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("tasksync.db"),
            max_connections: 10,
            enable_wal: true,
            busy_timeout_ms: 5_000,
            log_level: LogLevel::Info,
            accounts: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Resolves `database_path` against `base` when it is relative
    pub fn database_path_in(&self, base: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            base.join(&self.database_path)
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut checks = Checks::new();

        if self.database_path.as_os_str().is_empty() {
            checks.fail(ValidationError::new("server.database_path", "must not be empty"));
        }

        checks
            .range("server.max_connections", self.max_connections, 1..=64)
            .range("server.busy_timeout_ms", self.busy_timeout_ms, 0..=60_000);

        for (i, identity) in self.accounts.iter().enumerate() {
            checks.non_blank(&format!("server.accounts[{}]", i), identity);
        }

        checks.finish()
    }

    fn merge(&mut self, other: Self) {
        self.database_path = other.database_path;
        self.max_connections = other.max_connections;
        self.enable_wal = other.enable_wal;
        self.busy_timeout_ms = other.busy_timeout_ms;
        self.log_level = other.log_level;
        self.accounts = other.accounts;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}
