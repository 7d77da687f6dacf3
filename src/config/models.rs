#[cfg(test)]
use std::cell::RefCell;
#[cfg(not(test))]
use std::sync::OnceLock;

use eyre::Result;
use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_LOG_LEVEL, LOG_FILE_PATH, MAX_CONTENT_LENGTH};
use super::defaults::*;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Configuration {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogConfig {
    #[serde(default = "log_level")]
    pub level: Option<String>,

    #[serde(default)]
    pub filters: Option<Vec<LogFilter>>,

    #[serde(default)]
    pub file: LogFile,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFilter {
    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFile {
    #[serde(default = "log_file_path")]
    pub path: String,

    #[serde(default)]
    pub append: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum StorageConfig {
    #[serde(rename = "sqlite")]
    Sqlite(SqliteStorage),
}

/// Defaults to a file under the user's data home. `path: None` is only built
/// through [`StorageConfig::in_memory`] and opens a database that lives as
/// long as the store.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SqliteStorage {
    #[serde(default = "database_path")]
    pub path: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StoreConfig {
    #[serde(default = "max_content_length")]
    pub max_content_length: usize,
}

#[cfg(not(test))]
static CONFIG: OnceLock<Configuration> = OnceLock::new();

// Tests run in parallel, so each thread gets its own configuration.
#[cfg(test)]
thread_local! {
    static TEST_CONFIG: RefCell<&'static Configuration> =
        RefCell::new(Box::leak(Box::new(Configuration::default())));
}

impl Configuration {
    #[cfg(not(test))]
    pub fn instance() -> &'static Configuration {
        CONFIG.get_or_init(Configuration::default)
    }

    #[cfg(not(test))]
    pub fn init(config: Configuration) -> Result<()> {
        CONFIG
            .set(config)
            .map_err(|_| eyre::eyre!("configuration already initialized"))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn instance() -> &'static Configuration {
        TEST_CONFIG.with(|config| *config.borrow())
    }

    #[cfg(test)]
    pub fn init(config: Configuration) -> Result<()> {
        TEST_CONFIG.with(|test_config| {
            *test_config.borrow_mut() = Box::leak(Box::new(config));
        });
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_string()),
            file: LogFile::default(),
            filters: None,
        }
    }
}

impl Default for LogFile {
    fn default() -> Self {
        Self {
            path: LOG_FILE_PATH.to_string(),
            append: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite(SqliteStorage::default())
    }
}

impl Default for SqliteStorage {
    fn default() -> Self {
        Self {
            path: database_path(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::Sqlite(SqliteStorage { path: None })
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::Sqlite(SqliteStorage {
            path: Some(path.into()),
        })
    }
}
