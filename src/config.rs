//! Run configuration.
//!
//! Values come from built-in defaults, then an optional `mysqlite.toml`,
//! then whatever the command line overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Name of the project-local config file.
pub const CONFIG_FILE: &str = "mysqlite.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// MySQL script to read.
    pub input: PathBuf,
    /// SQLite database to (re)create.
    pub target: PathBuf,
    /// Print each converted CREATE TABLE statement as it runs.
    pub echo_ddl: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("hospital.sql"),
            target: PathBuf::from("hospital.db"),
            echo_ddl: false,
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the first config file found, or the defaults when there is none.
    ///
    /// An explicit path must exist. Otherwise `./mysqlite.toml` is tried,
    /// then `<config dir>/mysqlite/config.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }

        match search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::from_path(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("mysqlite").join("config.toml"));
    }
    paths
}
