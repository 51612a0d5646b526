use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};
use serde_json::json;

use super::{ChessCard, LocalDataset, write_card};
use crate::error::UploadError;
use crate::http::{RetryPolicy, post_with_retries};

const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

pub struct HubClient {
    endpoint: String,
    token: String,
    policy: RetryPolicy,
}

impl HubClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            policy,
        }
    }

    /// Reads `HF_TOKEN` and the optional `HF_ENDPOINT`.
    pub fn from_env() -> Result<Self, UploadError> {
        let token = env::var("HF_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(UploadError::MissingToken)?;
        let endpoint = env::var("HF_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Ok(Self::new(endpoint, token, RetryPolicy::default()))
    }

    fn create_dataset_repo(&self, repo_id: &str) -> Result<(), UploadError> {
        let (organization, name) = match repo_id.split_once('/') {
            Some((org, name)) => (Some(org), name),
            None => (None, repo_id),
        };
        let mut body = json!({ "type": "dataset", "name": name, "private": false });
        if let Some(org) = organization {
            body["organization"] = json!(org);
        }
        let url = format!("{}/api/repos/create", self.endpoint);
        match post_with_retries(
            &url,
            &self.token,
            "application/json",
            &body.to_string(),
            self.policy,
        ) {
            Ok(_) => {
                info!("created hub dataset repo {repo_id}");
                Ok(())
            }
            Err(failure) if failure.status == Some(409) => {
                info!("hub dataset repo {repo_id} already exists");
                Ok(())
            }
            Err(failure) => Err(UploadError::Request(failure.message)),
        }
    }

    fn commit_files(&self, repo_id: &str, root: &Path, files: &[PathBuf]) -> Result<(), UploadError> {
        let mut ndjson = json!({
            "key": "header",
            "value": { "summary": "Upload chess teleoperation dataset", "description": "" }
        })
        .to_string();
        ndjson.push('\n');

        for path in files {
            let bytes = fs::read(path)?;
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let line = json!({
                "key": "file",
                "value": {
                    "path": relative,
                    "encoding": "base64",
                    "content": STANDARD.encode(&bytes),
                }
            });
            ndjson.push_str(&line.to_string());
            ndjson.push('\n');
        }

        let url = format!("{}/api/datasets/{repo_id}/commit/main", self.endpoint);
        post_with_retries(&url, &self.token, "application/x-ndjson", &ndjson, self.policy)
            .map_err(|failure| UploadError::Request(failure.message))?;
        info!("committed {} files to hub dataset {repo_id}", files.len());
        Ok(())
    }
}

/// Copies the PGN into the dataset, writes the card and uploads every file.
pub fn publish(
    dataset: &LocalDataset,
    pgn_path: &Path,
    color: &'static str,
    client: &HubClient,
) -> Result<(), UploadError> {
    let pgn_file = pgn_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "game.pgn".to_string());
    let dest = dataset.dir().join(&pgn_file);
    fs::copy(pgn_path, &dest)?;
    info!("copied PGN file to {}", dest.display());

    write_card(
        dataset,
        &ChessCard {
            pgn_file,
            color,
            total_episodes: dataset.total_episodes(),
        },
    )
    .map_err(|err| UploadError::Card(format!("{err:#}")))?;

    let mut files = Vec::new();
    collect_files(dataset.dir(), &mut files)?;
    files.sort();

    client.create_dataset_repo(dataset.repo_id())?;
    client.commit_files(dataset.repo_id(), dataset.dir(), &files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        } else {
            warn!("skipping non-regular file {}", path.display());
        }
    }
    Ok(())
}
