mod hub;

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::StartupError;
use crate::rig::{Frame, RigInfo};

pub use hub::{HubClient, publish};

pub const CODEBASE_VERSION: &str = "v2.1";
const CHUNK_DIR: &str = "chunk-000";

/// An episode that survived recording, with the chess metadata attached.
#[derive(Debug, Clone)]
pub struct FinishedEpisode {
    pub move_index: usize,
    pub ply: usize,
    pub color: &'static str,
    pub fen: String,
    pub san: String,
    pub task: String,
    pub frames: Vec<Frame>,
    pub duration: Duration,
    pub ended_early: bool,
    pub rerecords: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Where finished episodes go. Discarded episodes never reach it.
pub trait EpisodeSink {
    /// Persists one episode and returns its dataset index.
    fn save_episode(&mut self, episode: &FinishedEpisode) -> Result<usize>;
}

#[derive(Debug, Serialize)]
struct EpisodeLine<'a> {
    episode_index: usize,
    tasks: [&'a str; 1],
    length: usize,
    duration_s: f64,
    ended_early: bool,
    rerecords: u32,
    recorded_at: String,
    chess_fen: &'a str,
    chess_move: &'a str,
    chess_color: &'a str,
    move_index: usize,
    ply: usize,
}

/// Dataset directory laid out like the robotics library's format:
/// `meta/info.json`, `meta/tasks.jsonl`, `meta/episodes.jsonl` and one
/// JSON-lines data file per episode.
pub struct LocalDataset {
    dir: PathBuf,
    repo_id: String,
    fps: u32,
    robot_type: String,
    features: Map<String, Value>,
    tasks: Vec<String>,
    total_episodes: usize,
    total_frames: usize,
}

impl LocalDataset {
    /// `<root>/<repo_id>`, after checking that `repo_id` is a hub id and so
    /// cannot leave `root`.
    pub fn dataset_dir(root: &Path, repo_id: &str) -> Result<PathBuf, StartupError> {
        validate_repo_id(repo_id)?;
        Ok(root.join(repo_id))
    }

    pub fn create(root: &Path, repo_id: &str, fps: u32, rig: &RigInfo) -> Result<Self> {
        let dir = Self::dataset_dir(root, repo_id)?;
        for sub in ["meta", "data"] {
            let path = dir.join(sub);
            fs::create_dir_all(&path)
                .with_context(|| format!("failed to create dataset directory {}", path.display()))?;
        }
        fs::create_dir_all(dir.join("data").join(CHUNK_DIR))?;

        let dataset = Self {
            dir,
            repo_id: repo_id.to_string(),
            fps,
            robot_type: rig.robot_type.clone(),
            features: rig.features.clone(),
            tasks: Vec::new(),
            total_episodes: 0,
            total_frames: 0,
        };
        dataset.write_info()?;
        info!("created dataset {} at {}", repo_id, dataset.dir.display());
        Ok(dataset)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    fn task_index(&mut self, task: &str) -> Result<usize> {
        if let Some(idx) = self.tasks.iter().position(|known| known == task) {
            return Ok(idx);
        }
        let idx = self.tasks.len();
        append_json_line(
            &self.dir.join("meta").join("tasks.jsonl"),
            &json!({ "task_index": idx, "task": task }),
        )?;
        self.tasks.push(task.to_string());
        Ok(idx)
    }

    fn write_info(&self) -> Result<()> {
        let info = json!({
            "codebase_version": CODEBASE_VERSION,
            "robot_type": self.robot_type,
            "fps": self.fps,
            "total_episodes": self.total_episodes,
            "total_frames": self.total_frames,
            "total_tasks": self.tasks.len(),
            "total_chunks": 1,
            "data_path": "data/chunk-{episode_chunk:03d}/episode_{episode_index:06d}.jsonl",
            "features": self.features,
        });
        let path = self.dir.join("meta").join("info.json");
        let text = serde_json::to_string_pretty(&info)?;
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    fn episode_data_path(&self, episode_index: usize) -> PathBuf {
        self.dir
            .join("data")
            .join(CHUNK_DIR)
            .join(format!("episode_{episode_index:06}.jsonl"))
    }

    fn write_frames(
        &self,
        path: &Path,
        episode_index: usize,
        task_index: usize,
        frames: &[Frame],
    ) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for (frame_index, frame) in frames.iter().enumerate() {
            let line = json!({
                "episode_index": episode_index,
                "frame_index": frame_index,
                "index": self.total_frames + frame_index,
                "task_index": task_index,
                "timestamp": frame_index as f64 / f64::from(self.fps),
                "observation": frame.observation,
                "action": frame.action,
            });
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Counts the episode in `info.json`, then appends its metadata line. On
    /// failure the totals are rolled back.
    fn commit_episode(&mut self, line: &EpisodeLine<'_>, frames: usize) -> Result<()> {
        self.total_episodes += 1;
        self.total_frames += frames;
        let result = self
            .write_info()
            .and_then(|()| append_json_line(&self.dir.join("meta").join("episodes.jsonl"), line));
        if result.is_err() {
            self.total_episodes -= 1;
            self.total_frames -= frames;
            if let Err(err) = self.write_info() {
                warn!("failed to restore {}: {err:#}", self.dir.join("meta").join("info.json").display());
            }
        }
        result
    }
}

impl EpisodeSink for LocalDataset {
    fn save_episode(&mut self, episode: &FinishedEpisode) -> Result<usize> {
        let episode_index = self.total_episodes;
        let task_index = self.task_index(&episode.task)?;
        let data_path = self.episode_data_path(episode_index);

        let line = EpisodeLine {
            episode_index,
            tasks: [episode.task.as_str()],
            length: episode.frames.len(),
            duration_s: episode.duration.as_secs_f64(),
            ended_early: episode.ended_early,
            rerecords: episode.rerecords,
            recorded_at: episode.recorded_at.to_rfc3339(),
            chess_fen: &episode.fen,
            chess_move: &episode.san,
            chess_color: episode.color,
            move_index: episode.move_index,
            ply: episode.ply,
        };
        let saved = self
            .write_frames(&data_path, episode_index, task_index, &episode.frames)
            .and_then(|()| self.commit_episode(&line, episode.frames.len()));
        if let Err(err) = saved {
            if data_path.exists()
                && let Err(cleanup) = fs::remove_file(&data_path)
            {
                warn!("failed to remove {}: {cleanup}", data_path.display());
            }
            return Err(err);
        }

        info!(
            "saved episode {episode_index} ({} frames) for move {}",
            episode.frames.len(),
            episode.san
        );
        Ok(episode_index)
    }
}

const MAX_REPO_NAME_LEN: usize = 96;

/// Accepts `name` or `namespace/name`, each part made of ASCII letters, digits,
/// `-`, `_` and `.`, not starting or ending with `-` or `.`, without `--` or `..`.
pub fn validate_repo_id(repo_id: &str) -> Result<(), StartupError> {
    let invalid = |reason| StartupError::RepoId {
        repo_id: repo_id.to_string(),
        reason,
    };
    let parts: Vec<&str> = repo_id.split('/').collect();
    if parts.len() > 2 {
        return Err(invalid("expected `name` or `namespace/name`"));
    }
    for part in parts {
        if part.is_empty() {
            return Err(invalid("empty path component"));
        }
        if part.len() > MAX_REPO_NAME_LEN {
            return Err(invalid("component longer than 96 characters"));
        }
        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid("only letters, digits, '-', '_' and '.' are allowed"));
        }
        if part.starts_with(['-', '.']) || part.ends_with(['-', '.']) {
            return Err(invalid("components cannot start or end with '-' or '.'"));
        }
        if part.contains("--") || part.contains("..") {
            return Err(invalid("'--' and '..' are not allowed"));
        }
    }
    Ok(())
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    file.write_all(line.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))
}

/// Dataset card fields that describe the recorded game.
#[derive(Debug, Clone)]
pub struct ChessCard {
    pub pgn_file: String,
    pub color: &'static str,
    pub total_episodes: usize,
}

pub fn write_card(dataset: &LocalDataset, card: &ChessCard) -> Result<PathBuf> {
    let text = format!(
        "---\nlicense: apache-2.0\ntask_categories:\n- robotics\ntags:\n- LeRobot\n- chess\nchess_pgn_file: {pgn}\nchess_color: {color}\nchess_total_episodes: {total}\n---\n\n# {repo}\n\nTeleoperated chess-move demonstrations recorded with a {robot} arm.\n\n- Game: `{pgn}`\n- Color: {color}\n- Episodes: {total}\n- FPS: {fps}\n\nEach episode's task is `FEN: <position> $$ MOVE: <san>`.\n",
        pgn = card.pgn_file,
        color = card.color,
        total = card.total_episodes,
        repo = dataset.repo_id,
        robot = if dataset.robot_type.is_empty() {
            "robot"
        } else {
            dataset.robot_type.as_str()
        },
        fps = dataset.fps,
    );
    let path = dataset.dir.join("README.md");
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(task: &str, frames: usize) -> FinishedEpisode {
        let mut frame = Frame::default();
        frame.observation.insert("shoulder.pos".to_string(), json!(0.5));
        frame.action.insert("shoulder.pos".to_string(), json!(0.4));
        FinishedEpisode {
            move_index: 0,
            ply: 0,
            color: "white",
            fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
            san: "e4".to_string(),
            task: task.to_string(),
            frames: vec![frame; frames],
            duration: Duration::from_secs(2),
            ended_early: false,
            rerecords: 1,
            recorded_at: Utc::now(),
        }
    }

    fn rig_info() -> RigInfo {
        RigInfo {
            robot_type: "so101_follower".to_string(),
            features: Map::new(),
        }
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .expect("read jsonl")
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid json line"))
            .collect()
    }

    #[test]
    fn save_episode_writes_frames_and_metadata() {
        let root = tempfile::tempdir().unwrap();
        let mut dataset = LocalDataset::create(root.path(), "me/chess", 30, &rig_info()).unwrap();

        let idx = dataset.save_episode(&episode("FEN: x $$ MOVE: e4", 3)).unwrap();
        assert_eq!(idx, 0);

        let frames = read_lines(&dataset.dir().join("data/chunk-000/episode_000000.jsonl"));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2]["frame_index"], json!(2));
        assert_eq!(frames[0]["observation"]["shoulder.pos"], json!(0.5));

        let episodes = read_lines(&dataset.dir().join("meta/episodes.jsonl"));
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0]["chess_move"], json!("e4"));
        assert_eq!(episodes[0]["rerecords"], json!(1));
        assert_eq!(episodes[0]["length"], json!(3));
    }

    #[test]
    fn tasks_are_deduplicated_and_totals_tracked() {
        let root = tempfile::tempdir().unwrap();
        let mut dataset = LocalDataset::create(root.path(), "me/chess", 30, &rig_info()).unwrap();

        dataset.save_episode(&episode("task-a", 2)).unwrap();
        dataset.save_episode(&episode("task-b", 1)).unwrap();
        dataset.save_episode(&episode("task-a", 4)).unwrap();

        let tasks = read_lines(&dataset.dir().join("meta/tasks.jsonl"));
        assert_eq!(tasks.len(), 2);

        let info: Value = serde_json::from_str(
            &fs::read_to_string(dataset.dir().join("meta/info.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(info["total_episodes"], json!(3));
        assert_eq!(info["total_frames"], json!(7));
        assert_eq!(info["robot_type"], json!("so101_follower"));
        assert_eq!(dataset.total_episodes(), 3);
    }

    #[test]
    fn card_carries_chess_tags() {
        let root = tempfile::tempdir().unwrap();
        let dataset = LocalDataset::create(root.path(), "me/chess", 30, &rig_info()).unwrap();
        let path = write_card(
            &dataset,
            &ChessCard {
                pgn_file: "game.pgn".to_string(),
                color: "black",
                total_episodes: 12,
            },
        )
        .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("- chess\n"));
        assert!(text.contains("chess_pgn_file: game.pgn"));
        assert!(text.contains("chess_color: black"));
        assert!(text.contains("chess_total_episodes: 12"));
    }

    #[test]
    fn hub_style_repo_ids_are_accepted() {
        for repo_id in ["me/chess", "chess_moves", "Org-1/so101.chess_v2"] {
            let dir = LocalDataset::dataset_dir(Path::new("/data"), repo_id).unwrap();
            assert!(dir.starts_with("/data"), "{repo_id}");
        }
    }

    #[test]
    fn repo_ids_that_escape_the_root_are_rejected() {
        for repo_id in [
            "/home/op",
            "../../..",
            "me/..",
            ".",
            "me/chess/extra",
            "",
            "me/",
            "me\\chess",
            "-chess",
            "me/chess.",
            "me/ch..ess",
            "me/chess moves",
        ] {
            let err = LocalDataset::dataset_dir(Path::new("/data"), repo_id).unwrap_err();
            assert!(matches!(err, StartupError::RepoId { .. }), "{repo_id}");
        }
    }

    #[test]
    fn create_refuses_invalid_repo_id_without_touching_disk() {
        let root = tempfile::tempdir().unwrap();
        let result = LocalDataset::create(root.path(), "../outside", 30, &rig_info());
        assert!(result.is_err());
        assert!(!root.path().join("../outside").exists());
    }

    #[test]
    fn failed_save_leaves_no_episode_behind() {
        let root = tempfile::tempdir().unwrap();
        let mut dataset = LocalDataset::create(root.path(), "me/chess", 30, &rig_info()).unwrap();
        fs::create_dir(dataset.dir().join("meta/episodes.jsonl")).unwrap();

        assert!(dataset.save_episode(&episode("task-a", 3)).is_err());

        assert!(!dataset.dir().join("data/chunk-000/episode_000000.jsonl").exists());
        assert_eq!(dataset.total_episodes(), 0);
        let info: Value = serde_json::from_str(
            &fs::read_to_string(dataset.dir().join("meta/info.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(info["total_episodes"], json!(0));
        assert_eq!(info["total_frames"], json!(0));

        fs::remove_dir(dataset.dir().join("meta/episodes.jsonl")).unwrap();
        assert_eq!(dataset.save_episode(&episode("task-a", 2)).unwrap(), 0);
        assert!(dataset.dir().join("data/chunk-000/episode_000000.jsonl").exists());
    }
}
