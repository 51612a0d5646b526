use std::fs;

use anyhow::{Context, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, opt_format};

use crate::paths::log_directory;

/// Starts file logging. `RUST_LOG` wins over `level`. The terminal belongs to
/// the session screen, so nothing is duplicated to stderr.
pub fn init(level: &str) -> Result<LoggerHandle> {
    let dir = log_directory()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    Logger::try_with_env_or_str(level)
        .with_context(|| format!("invalid log level {level:?}"))?
        .log_to_file(FileSpec::default().directory(&dir).basename("lechess-record"))
        .format(opt_format)
        .rotate(
            Criterion::Size(10 * 1024 * 1024),
            Naming::Numbers,
            Cleanup::KeepLogFiles(5),
        )
        .start()
        .context("failed to start logger")
}
