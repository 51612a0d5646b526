use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn default_dataset_root() -> Result<PathBuf> {
    if let Some(home) = env::var_os("HF_LEROBOT_HOME") {
        return Ok(PathBuf::from(home));
    }
    let base = dirs::cache_dir().context("unable to resolve cache directory")?;
    Ok(base.join("huggingface").join("lerobot"))
}

pub fn default_config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("lechess").join("record.toml"))
}

pub fn log_directory() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("lechess").join("logs"))
}
