use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Casper node JSON-RPC endpoint used when no configuration file exists.
pub const DEFAULT_NODE_RPC_URL: &str = "http://127.0.0.1:7777/rpc";

/// Directory (relative to the working directory) that receives run logs.
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write configuration file {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("configuration file {path:?} format error: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_rpc_url: String,
    pub log_dir: String,
}

impl Config {
    fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.into_owned())
    }

    /// `~/.casper-probe/config.json`, or a relative fallback when there is no home directory.
    pub fn default_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(".casper-probe").join("config.json"),
            None => PathBuf::from(".casper-probe").join("config.json"),
        }
    }

    /// Log directory with tilde expansion applied.
    pub fn log_dir_resolved(&self) -> PathBuf {
        Self::expand_path(&self.log_dir)
    }

    /// Loads the configuration from [`Config::default_path`]. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_rpc_url: DEFAULT_NODE_RPC_URL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}
