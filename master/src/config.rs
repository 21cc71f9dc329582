use serde::Deserialize;
use std::fs;
use std::path::Path;

use cache_common::constants::{MAX_COLUMNS, WORKER_TIMEOUT_MS};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub underfs_address: String,
    pub worker_timeout_ms: i64,
    pub max_columns: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7001".to_string(),
            underfs_address: "file:///var/cache/underfs".to_string(),
            worker_timeout_ms: WORKER_TIMEOUT_MS as i64,
            max_columns: MAX_COLUMNS,
        }
    }
}

pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Config::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read config, using defaults");
            return Config::default();
        }
    };

    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to parse config, using defaults");
            Config::default()
        }
    }
}
