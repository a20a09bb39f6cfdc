pub mod chat;
pub mod history;
pub mod init;
pub mod serve;

use anyhow::Context;
use staybot_config::AppConfig;
use std::path::{Path, PathBuf};

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = config_path(path);
    AppConfig::load_with_env(&path).context("Failed to load config")
}

pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}
