use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use cache_common::constants::{TO_MASTER_HEARTBEAT_INTERVAL_MS, USER_TIMEOUT_MS};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub advertise_host: String,
    pub advertise_port: u16,
    pub master_address: String,
    pub capacity_bytes: i64,
    pub data_folder: PathBuf,
    pub temp_folder: PathBuf,
    pub underfs_temp_folder: PathBuf,
    pub underfs_data_folder: PathBuf,
    pub heartbeat_interval_ms: u64,
    pub user_timeout_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7101".to_string(),
            advertise_host: "127.0.0.1".to_string(),
            advertise_port: 7101,
            master_address: "http://127.0.0.1:7001".to_string(),
            capacity_bytes: 1 << 30,
            data_folder: PathBuf::from("/var/cache/worker/data"),
            temp_folder: PathBuf::from("/var/cache/worker/tmp"),
            underfs_temp_folder: PathBuf::from("/var/cache/worker/ufs-tmp"),
            underfs_data_folder: PathBuf::from("/var/cache/underfs"),
            heartbeat_interval_ms: TO_MASTER_HEARTBEAT_INTERVAL_MS,
            user_timeout_ms: USER_TIMEOUT_MS as i64,
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
