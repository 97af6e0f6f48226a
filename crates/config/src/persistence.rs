//! Reading and writing `config.toml`
//!
//! Writes go to a temporary file in the same directory which then replaces
//! the target, so a crash leaves either the old file or the new one. The
//! previous file is kept next to it as `config.toml.backup`.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const HEADER: &str = "\
# TaskSync configuration
#
# [server] database_path is resolved against this directory when relative.
# [sync] a zero max_batch_size, max_content_bytes or max_pull_records means no limit.
# Any value can be overridden with TASKSYNC_<SECTION>_<FIELD>.

";

/// The config file at one path
pub(crate) struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the file, or returns defaults when there is none
    ///
    /// Values that parse but fail validation are kept and logged, so an
    /// operator can still start the server and fix them.
    pub fn load(&self) -> ConfigResult<Config> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if config.version < CONFIG_VERSION {
            log::info!(
                "{} is format version {}; missing settings take their defaults",
                self.path.display(),
                config.version
            );
        }

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("{}: {}", self.path.display(), error);
            }
        }

        Ok(config)
    }

    /// Validates and writes `config`
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        self.replace(&config.to_toml()?)?;

        log::info!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Writes the default config with an explanatory header
    pub fn write_default(&self) -> ConfigResult<()> {
        let body = Config::default().to_toml()?;
        self.replace(&format!("{}{}", HEADER, body))?;

        log::info!("Wrote default config to {}", self.path.display());
        Ok(())
    }

    fn replace(&self, contents: &str) -> ConfigResult<()> {
        let write_error = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(write_error)?;

        if self.path.exists() {
            fs::copy(&self.path, self.path.with_extension("toml.backup")).map_err(write_error)?;
        }

        let mut staged = NamedTempFile::new_in(dir).map_err(write_error)?;
        staged.write_all(contents.as_bytes()).map_err(write_error)?;
        staged.as_file().sync_all().map_err(write_error)?;
        staged
            .persist(&self.path)
            .map_err(|e| write_error(e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file() -> (TempDir, ConfigFile) {
        let dir = TempDir::new().unwrap();
        let file = ConfigFile::new(dir.path().join("config.toml"));
        (dir, file)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (_dir, file) = config_file();
        assert_eq!(file.load().unwrap(), Config::default());
    }

    #[test]
    fn test_saved_config_loads_back() {
        let (_dir, file) = config_file();
        let mut config = Config::default();
        config.sync.max_pull_records = 200;
        config.server.accounts = vec!["a@example.com".to_string()];

        file.save(&config).unwrap();
        assert_eq!(file.load().unwrap(), config);
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc").join("tasksync").join("config.toml");

        ConfigFile::new(path.clone()).save(&Config::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_overwrite_keeps_previous_file() {
        let (dir, file) = config_file();
        let mut first = Config::default();
        first.sync.gzip_responses = false;
        file.save(&first).unwrap();
        file.save(&Config::default()).unwrap();

        let backup = fs::read_to_string(dir.path().join("config.toml.backup")).unwrap();
        assert!(backup.contains("gzip_responses = false"));
    }

    #[test]
    fn test_invalid_config_is_not_written() {
        let (dir, file) = config_file();
        let mut config = Config::default();
        config.sync.retry_attempts = 0;

        match file.save(&config) {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors[0].field, "sync.retry_attempts"),
            other => panic!("Expected Invalid, got {:?}", other),
        }
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_unparseable_and_blank_files() {
        let (dir, file) = config_file();
        let path = dir.path().join("config.toml");

        fs::write(&path, "this is not valid TOML {{{").unwrap();
        assert!(matches!(file.load(), Err(ConfigError::Parse { .. })));

        fs::write(&path, "  \n").unwrap();
        assert!(matches!(file.load(), Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn test_out_of_range_values_still_load() {
        let (dir, file) = config_file();
        fs::write(dir.path().join("config.toml"), "[sync]\nretry_attempts = 0\n").unwrap();

        assert_eq!(file.load().unwrap().sync.retry_attempts, 0);
    }

    #[test]
    fn test_default_file_has_header_and_defaults() {
        let (dir, file) = config_file();
        file.write_default().unwrap();

        let text = fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(text.starts_with("# TaskSync configuration"));
        assert_eq!(file.load().unwrap(), Config::default());
    }
}
