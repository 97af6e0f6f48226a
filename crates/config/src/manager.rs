//! Locating, loading and saving `config.toml`

use crate::persistence::ConfigFile;
use crate::server_config::LogLevel;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FILE_NAME: &str = "config.toml";

/// Entry point for the config file of one TaskSync installation
///
/// Relative paths inside the config, such as `server.database_path`, are
/// resolved against the directory the manager was built for.
pub struct ConfigManager {
    file: ConfigFile,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses the platform config directory, e.g. `~/.config/tasksync/` on Linux
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "tasksync").ok_or(ConfigError::NoConfigDir)?;
        Self::with_directory(dirs.config_dir().to_path_buf())
    }

    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self {
            file: ConfigFile::new(config_dir.join(FILE_NAME)),
            config_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(FILE_NAME)
    }

    /// Database location for `config`, anchored at the config directory
    pub fn database_path(&self, config: &Config) -> PathBuf {
        config.server.database_path_in(&self.config_dir)
    }

    /// Reads the config file; a missing file yields the defaults
    pub fn load(&self) -> ConfigResult<Config> {
        self.file.load()
    }

    /// Like [`load`](Self::load), but an unreadable file also yields the defaults
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_else(|e| {
            log::warn!("Ignoring config file: {}", e);
            Config::default()
        })
    }

    /// Writes `config`, refusing it when it does not validate
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.file.save(config)
    }

    /// Loads, edits and saves in one step
    ///
    /// ```rust,no_run
    /// # use tasksync_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| config.sync.max_pull_records = 500)?;
    /// # Ok::<(), tasksync_config::ConfigError>(())
    /// ```
    pub fn update<F>(&self, edit: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        edit(&mut config);
        self.save(&config)
    }

    /// Writes the commented default file unless one is already there
    ///
    /// Returns whether a file was written.
    pub fn initialize(&self) -> ConfigResult<bool> {
        let path = self.config_path();
        if path.exists() {
            log::debug!("Keeping existing config at {}", path.display());
            return Ok(false);
        }

        self.file.write_default()?;
        Ok(true)
    }

    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Problems in the config file as `field: message` lines, empty when valid
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;
        Ok(config
            .validate()
            .err()
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// [`load_with_overrides`](Self::load_with_overrides) over the process environment
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        self.load_with_overrides(|name| std::env::var(name).ok())
    }

    /// Loads the file, then applies `TASKSYNC_<SECTION>_<FIELD>` values from `lookup`
    ///
    /// A value that does not parse is an error. A value that parses but is
    /// out of range is only logged, like an out-of-range value in the file.
    pub fn load_with_overrides<F>(&self, lookup: F) -> ConfigResult<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.load()?;
        apply_overrides(&mut config, lookup)?;

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("After environment overrides: {}", error);
            }
        }

        Ok(config)
    }
}

pub(crate) fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &'static str| lookup(name).map(|value| (name, value));

    if let Some((_, path)) = var("TASKSYNC_SERVER_DATABASE_PATH") {
        config.server.database_path = PathBuf::from(path);
    }
    if let Some((name, value)) = var("TASKSYNC_SERVER_LOG_LEVEL") {
        config.server.log_level = parse_var(name, &value, LogLevel::from_str)?;
    }
    if let Some((_, list)) = var("TASKSYNC_SERVER_ACCOUNTS") {
        config.server.accounts = list
            .split(',')
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some((name, value)) = var("TASKSYNC_SYNC_MAX_BATCH_SIZE") {
        config.sync.max_batch_size = parse_var(name, &value, str::parse)?;
    }
    if let Some((name, value)) = var("TASKSYNC_SYNC_MAX_PULL_RECORDS") {
        config.sync.max_pull_records = parse_var(name, &value, str::parse)?;
    }
    if let Some((name, value)) = var("TASKSYNC_SYNC_GZIP_RESPONSES") {
        config.sync.gzip_responses = parse_var(name, &value, str::parse)?;
    }

    Ok(())
}

fn parse_var<T, E, P>(variable: &str, value: &str, parse: P) -> ConfigResult<T>
where
    P: FnOnce(&str) -> Result<T, E>,
    E: std::fmt::Display,
{
    parse(value.trim()).map_err(|e| ConfigError::EnvOverride {
        variable: variable.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        let config = manager.load_or_default();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.sync.max_pull_records = 75;

        manager.save(&config).expect("Should save config");
        let loaded = manager.load().expect("Should load config");

        assert_eq!(loaded.sync.max_pull_records, 75);
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        manager
            .update(|config| {
                config.server.log_level = LogLevel::Debug;
            })
            .expect("Should update");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded.server.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_initialize_creates_file_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_reset() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.sync.gzip_responses = false;
        manager.save(&config).expect("Should save");

        manager.reset().expect("Should reset");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_validate_reports_file_errors() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(
            manager.config_path(),
            "[server]\nmax_connections = 0\n",
        )
        .expect("Should write");

        let errors = manager.validate().expect("Should validate");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("server.max_connections"));
    }

    #[test]
    fn test_database_path_relative_to_config_dir() {
        let (temp_dir, manager) = setup_test_manager();
        let config = Config::default();

        assert_eq!(
            manager.database_path(&config),
            temp_dir.path().join("tasksync.db")
        );
    }

    #[test]
    fn test_overrides_apply() {
        let (_temp_dir, manager) = setup_test_manager();
        let env = vars(&[
            ("TASKSYNC_SERVER_DATABASE_PATH", "/tmp/other.db"),
            ("TASKSYNC_SERVER_LOG_LEVEL", "trace"),
            ("TASKSYNC_SERVER_ACCOUNTS", "a@example.com, b@example.com,"),
            ("TASKSYNC_SYNC_MAX_BATCH_SIZE", "20"),
            ("TASKSYNC_SYNC_MAX_PULL_RECORDS", "5"),
            ("TASKSYNC_SYNC_GZIP_RESPONSES", "false"),
        ]);

        let config = manager
            .load_with_overrides(|name| env.get(name).cloned())
            .expect("Should load with overrides");

        assert_eq!(config.server.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.server.log_level, LogLevel::Trace);
        assert_eq!(config.server.accounts, vec!["a@example.com", "b@example.com"]);
        assert_eq!(config.sync.max_batch_size, 20);
        assert_eq!(config.sync.max_pull_records, 5);
        assert!(!config.sync.gzip_responses);
    }

    #[test]
    fn test_override_beats_file() {
        let (_temp_dir, manager) = setup_test_manager();
        let mut config = Config::default();
        config.sync.max_batch_size = 10;
        manager.save(&config).expect("Should save");

        let env = vars(&[("TASKSYNC_SYNC_MAX_BATCH_SIZE", "30")]);
        let loaded = manager
            .load_with_overrides(|name| env.get(name).cloned())
            .expect("Should load");
        assert_eq!(loaded.sync.max_batch_size, 30);
    }

    #[test]
    fn test_unparseable_override_is_an_error() {
        let (_temp_dir, manager) = setup_test_manager();
        let env = vars(&[("TASKSYNC_SYNC_MAX_BATCH_SIZE", "lots")]);

        let result = manager.load_with_overrides(|name| env.get(name).cloned());
        assert!(matches!(
            result,
            Err(ConfigError::EnvOverride { ref variable, .. }) if variable == "TASKSYNC_SYNC_MAX_BATCH_SIZE"
        ));
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
    }
}
