use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

/// Name of the data directory `tm` looks for
pub const DATA_DIR_NAME: &str = ".taskmaster";

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Template written by `tm init`
const CONFIG_TEMPLATE: &str = r#"# taskmaster configuration

[storage]
# "file" keeps tasks in this directory; "memory" keeps nothing between runs
backend = "file"
# how long a write waits for another tm process to finish its own
lock_timeout_ms = 5000

[list]
# all | pending | completed
default_filter = "all"

[watch]
# how long `tm watch` waits for a change before checking again
poll_interval_ms = 200
"#;

/// Error type for data directory and config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no task list found: no .taskmaster/ directory here or in any parent (run `tm init`)")]
    NotFound,
    #[error("{0} already exists (use --force to reinitialize)")]
    AlreadyExists(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Find the data directory by walking up from `start`, looking for a
/// `.taskmaster/` subdirectory.
pub fn discover_data_dir(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(DATA_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Read config.toml from the data directory. A missing file means defaults.
pub fn read_config(data_dir: &Path) -> Result<Config, ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };
    toml::from_str(&text).map_err(|e| ConfigError::ParseError { path, source: e })
}

/// Create a data directory with a config template.
pub fn init_data_dir(data_dir: &Path, force: bool) -> Result<(), ConfigError> {
    if data_dir.exists() && !force {
        return Err(ConfigError::AlreadyExists(data_dir.to_path_buf()));
    }
    fs::create_dir_all(data_dir)?;
    fs::write(data_dir.join(CONFIG_FILE), CONFIG_TEMPLATE)?;
    Ok(())
}
