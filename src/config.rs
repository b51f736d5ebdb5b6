use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::mirror::MIRROR_FILE;

/// Recent list size used when nothing else is configured.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the mirror file (and the database by default)
    pub data_dir: ConfigValue<PathBuf>,
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Maximum number of entries in the recent list
    pub recent_limit: ConfigValue<usize>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    recent_limit: Option<usize>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut database_path = None;
        let mut recent_limit = ConfigValue::new(DEFAULT_RECENT_LIMIT, ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                data_dir = ConfigValue::new(resolve_relative(&path, dir), ConfigSource::File);
            }
            if let Some(db_path) = file_config.database_path {
                database_path = Some(ConfigValue::new(
                    resolve_relative(&path, db_path),
                    ConfigSource::File,
                ));
            }
            if let Some(limit) = file_config.recent_limit {
                recent_limit = ConfigValue::new(limit, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Some(dir) = env("PLATELOG_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Some(db_path) = env("PLATELOG_DATABASE_PATH") {
            database_path = Some(ConfigValue::new(
                PathBuf::from(db_path),
                ConfigSource::Environment,
            ));
        }
        if let Some(limit) = env("PLATELOG_RECENT_LIMIT") {
            let parsed = limit
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PLATELOG_RECENT_LIMIT", limit.clone()))?;
            recent_limit = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        if recent_limit.value == 0 {
            return Err(ConfigError::InvalidValue("recent_limit", "0".to_string()));
        }

        // The database follows the data directory unless set explicitly
        let database_path = database_path.unwrap_or_else(|| {
            ConfigValue::new(data_dir.value.join("platelog.db"), ConfigSource::Default)
        });

        Ok(Self {
            data_dir,
            database_path,
            recent_limit,
            config_file,
        })
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.data_dir.value.join(MIRROR_FILE)
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/platelog/
    /// - macOS: ~/Library/Application Support/platelog/
    /// - Windows: %APPDATA%/platelog/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("platelog")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/platelog/
    /// - macOS: ~/Library/Application Support/platelog/
    /// - Windows: %APPDATA%/platelog/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("platelog")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Resolve relative paths against the config file's directory
fn resolve_relative(config_file: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_file
            .parent()
            .map(|p| p.join(&path))
            .unwrap_or(path)
    } else {
        path
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_with_env(Some(config_path), no_env).unwrap();
        assert!(config.data_dir.value.ends_with("platelog"));
        assert_eq!(
            config.database_path.value,
            config.data_dir.value.join("platelog.db")
        );
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert_eq!(config.recent_limit.value, 50);
        assert_eq!(config.recent_limit.source, ConfigSource::Default);
        assert_eq!(config.config_file, None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/db.sqlite").unwrap();
        writeln!(file, "recent_limit: 20").unwrap();

        let config = Config::load_with_env(Some(config_path.clone()), no_env).unwrap();
        assert_eq!(
            config.database_path.value,
            PathBuf::from("/custom/path/db.sqlite")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.recent_limit.value, 20);
        assert_eq!(config.recent_limit.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: data\n").unwrap();

        let config = Config::load_with_env(Some(config_path), no_env).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("data"));
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data").join("platelog.db")
        );
        assert_eq!(config.mirror_path(), temp_dir.path().join("data").join("mirror.json"));
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "recent_limit: 20\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("PLATELOG_RECENT_LIMIT", "10"),
            ("PLATELOG_DATABASE_PATH", "/env/platelog.db"),
        ]);
        let config = Config::load_with_env(Some(config_path), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.recent_limit.value, 10);
        assert_eq!(config.recent_limit.source, ConfigSource::Environment);
        assert_eq!(config.database_path.value, PathBuf::from("/env/platelog.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);
    }

    #[test]
    fn test_invalid_recent_limit() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let result = Config::load_with_env(Some(config_path.clone()), |key| {
            (key == "PLATELOG_RECENT_LIMIT").then(|| "lots".to_string())
        });
        assert!(result.unwrap_err().to_string().contains("PLATELOG_RECENT_LIMIT"));

        let result = Config::load_with_env(Some(config_path), |key| {
            (key == "PLATELOG_RECENT_LIMIT").then(|| "0".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load_with_env(Some(config_path), no_env);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
