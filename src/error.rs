use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures that stop the program before the first move is shown.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read PGN file {path}: {source}")]
    PgnRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no valid PGN game found in {0}")]
    PgnEmpty(PathBuf),
    #[error("invalid starting position in FEN tag: {0}")]
    PgnSetup(String),
    #[error("illegal or unreadable move at ply {ply}: {san}")]
    PgnMove { ply: usize, san: String },
    #[error("{0} is not set to environment variable")]
    MissingEnv(&'static str),
    #[error("invalid repo id {repo_id:?}: {reason}")]
    RepoId { repo_id: String, reason: &'static str },
    #[error("invalid config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

/// A failure of the teleoperation layer while an episode is open.
/// The episode is discarded and the session keeps running.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("rig bridge failed to start: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("rig bridge did not answer within {0:?}")]
    Timeout(Duration),
    #[error("rig bridge pipe closed")]
    Disconnected,
    #[error("rig bridge I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("rig bridge sent a malformed response: {0}")]
    Protocol(String),
    #[error("rig reported: {0}")]
    Rig(String),
}

/// Publishing failures. The local dataset is always left in place.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("HF_TOKEN is not set; cannot push to the hub")]
    MissingToken,
    #[error("failed to write dataset card: {0}")]
    Card(String),
    #[error("failed to prepare dataset files: {0}")]
    Files(#[from] std::io::Error),
    #[error("hub request failed: {0}")]
    Request(String),
}
