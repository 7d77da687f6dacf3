#[cfg(test)]
#[path = "utils_test.rs"]
mod tests;

use chrono::Local;
use eyre::{Context, Result};
use log::LevelFilter;
use regex::Regex;
use std::{io::Write, str::FromStr};

use super::{Configuration, LogConfig, SqliteStorage, StorageConfig};

pub fn load_configuration(config_path: &str) -> Result<Configuration> {
    let config =
        std::fs::read_to_string(config_path).wrap_err(format!("reading {}", config_path))?;
    let config: Configuration = toml::from_str(&config).wrap_err("parsing configuration")?;
    Ok(config)
}

pub fn init_logger(config: &LogConfig) -> Result<()> {
    let path = resolve_path(&config.file.path)
        .wrap_err(format!("resolving log file path {}", config.file.path))?;
    init_parent_dir(&path)?;
    let log_file = Box::new(
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(config.file.append)
            .truncate(!config.file.append)
            .open(&path)
            .wrap_err(format!("opening log file {}", path))?,
    );

    let raw_level = config.level.as_deref().unwrap_or("info");
    let log_level = LevelFilter::from_str(raw_level)?;

    let mut builder = env_logger::Builder::new();

    for filter in config.filters.as_deref().unwrap_or_default() {
        let module_level = LevelFilter::from_str(filter.level.as_deref().unwrap_or(raw_level))
            .unwrap_or(log_level);
        builder.filter(filter.module.as_deref(), module_level);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}/{}:{} {} [{}] - {}",
                record.module_path().unwrap_or("unknown"),
                basename(record.file().unwrap_or("unknown")),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(log_file))
        .filter(None, log_level)
        .try_init()?;
    Ok(())
}

/// resolve_storage expands and absolutizes the database path, creating its
/// parent directory. In-memory storage is returned unchanged.
pub fn resolve_storage(config: &StorageConfig) -> Result<StorageConfig> {
    match config {
        StorageConfig::Sqlite(SqliteStorage { path: Some(path) }) => {
            let resolved =
                resolve_path(path).wrap_err(format!("resolving database path {}", path))?;
            init_parent_dir(&resolved)?;
            Ok(StorageConfig::sqlite(resolved))
        }
        StorageConfig::Sqlite(SqliteStorage { path: None }) => Ok(StorageConfig::in_memory()),
    }
}

pub fn basename(path: &str) -> String {
    path.split('/').last().unwrap_or(path).to_string()
}

/// resolve_path resolves the input path to an absolute path. If the
/// input path contains environment variables, it will expand them to their
/// values.
pub fn resolve_path(path: &str) -> Result<String> {
    let re = Regex::new(r"\$\{?([A-Za-z_]+)\}?").wrap_err("compiling regex")?;

    let mut ret = String::new();
    let mut last_pos = 0;

    for cap in re.captures_iter(path) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        ret.push_str(&path[last_pos..full_match.start()]);
        let var_value = std::env::var(var_name.as_str()).unwrap_or_default();
        ret.push_str(&var_value);
        last_pos = full_match.end();
    }
    ret.push_str(&path[last_pos..]);

    // Resolve the path to an absolute path
    let path = std::path::absolute(ret.as_str()).wrap_err(format!("resolving path {}", ret))?;
    Ok(path.to_string_lossy().to_string())
}

/// lookup_config_path trys to look up the config path at:
/// * $XDG_CONFIG_HOME/chatty-store/config.toml
/// * $HOME/.config/chatty-store/config.toml
/// * $HOME/.chatty-store.toml
pub fn lookup_config_path() -> Option<String> {
    let paths = &[
        format!(
            "{}/chatty-store/config.toml",
            env_or_current("XDG_CONFIG_HOME")
        ),
        format!("{}/.config/chatty-store/config.toml", env_or_current("HOME")),
        format!("{}/.chatty-store.toml", env_or_current("HOME")),
    ];

    for path in paths {
        if std::path::Path::new(path).exists() {
            return Some(path.to_string());
        }
    }
    None
}

fn env_or_current(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| ".".to_string())
}

fn init_parent_dir(path: &str) -> Result<()> {
    // Create parent dirs
    let dir = std::path::Path::new(path)
        .parent()
        .unwrap_or(std::path::Path::new("."));
    std::fs::create_dir_all(dir).wrap_err(format!("creating directory {}", dir.display()))?;
    Ok(())
}
