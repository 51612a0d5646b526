use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StartupError;

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_EPISODE_TIME_S: u64 = 60;
pub const MAX_EPISODE_TIME_S: u64 = 3600;
pub const MAX_FPS: u32 = 120;
pub const DEFAULT_CHECKPOINT_EVERY: u32 = 5;
pub const DEFAULT_BRIDGE_COMMAND: &str = "lerobot-rig-bridge";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmConfig {
    pub id: String,
    pub port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraSource {
    Index(u32),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub index_or_path: CameraSource,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default)]
    pub fps: Option<u32>,
}

fn default_camera_width() -> u32 {
    640
}

fn default_camera_height() -> u32 {
    480
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Longest wait for a `step`/`observe`/`disconnect` reply.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Longest wait for the `connect` reply; opening cameras and arms is slow.
    #[serde(default = "default_connect_timeout_s")]
    pub connect_timeout_s: u64,
}

fn default_response_timeout_ms() -> u64 {
    500
}

fn default_connect_timeout_s() -> u64 {
    30
}

impl BridgeConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_s.max(1))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_BRIDGE_COMMAND.to_string(),
            args: Vec::new(),
            response_timeout_ms: default_response_timeout_ms(),
            connect_timeout_s: default_connect_timeout_s(),
        }
    }
}

/// Shape of `record.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub fps: Option<u32>,
    pub episode_time_s: Option<u64>,
    pub play_sounds: Option<bool>,
    pub checkpoint_every: Option<u32>,
    pub dataset_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub bridge: Option<BridgeConfig>,
    pub cameras: Option<Vec<CameraConfig>>,
    pub follower: Option<ArmConfig>,
    pub leader: Option<ArmConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let raw = fs::read_to_string(path).map_err(|err| StartupError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|err| StartupError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordConfig {
    pub fps: u32,
    pub episode_time: Duration,
    pub play_sounds: bool,
    pub checkpoint_every: u32,
    pub dataset_root: PathBuf,
    pub log_level: String,
    pub bridge: BridgeConfig,
    pub cameras: Vec<CameraConfig>,
    pub follower: ArmConfig,
    pub leader: ArmConfig,
}

impl RecordConfig {
    /// Merges the file layer with the environment. Arm identifiers and ports
    /// come from `ID_FOLLOWER`, `ID_LEADER`, `PORT_FOLLOWER` and `PORT_LEADER`
    /// and fall back to the file's `[follower]`/`[leader]` tables.
    pub fn resolve<F>(
        file: FileConfig,
        env: F,
        default_dataset_root: PathBuf,
    ) -> Result<Self, StartupError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let fps = file.fps.unwrap_or(DEFAULT_FPS).clamp(1, MAX_FPS);
        let episode_time_s = file
            .episode_time_s
            .unwrap_or(DEFAULT_EPISODE_TIME_S)
            .clamp(1, MAX_EPISODE_TIME_S);
        let follower = resolve_arm(&env, file.follower, "ID_FOLLOWER", "PORT_FOLLOWER")?;
        let leader = resolve_arm(&env, file.leader, "ID_LEADER", "PORT_LEADER")?;

        let cameras = file
            .cameras
            .unwrap_or_else(default_cameras)
            .into_iter()
            .map(|camera| CameraConfig {
                fps: Some(camera.fps.unwrap_or(fps)),
                ..camera
            })
            .collect();

        Ok(Self {
            fps,
            episode_time: Duration::from_secs(episode_time_s),
            play_sounds: file.play_sounds.unwrap_or(true),
            checkpoint_every: file.checkpoint_every.unwrap_or(DEFAULT_CHECKPOINT_EVERY).max(1),
            dataset_root: file.dataset_root.unwrap_or(default_dataset_root),
            log_level: file.log_level.unwrap_or_else(|| "info".to_string()),
            bridge: file.bridge.unwrap_or_default(),
            cameras,
            follower,
            leader,
        })
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }
}

fn resolve_arm<F>(
    env: &F,
    fallback: Option<ArmConfig>,
    id_var: &'static str,
    port_var: &'static str,
) -> Result<ArmConfig, StartupError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let non_empty = |var| env(var).filter(|value: &String| !value.trim().is_empty());
    let id = non_empty(id_var).or_else(|| fallback.as_ref().map(|arm| arm.id.clone()));
    let port = non_empty(port_var).or_else(|| fallback.as_ref().map(|arm| arm.port.clone()));
    Ok(ArmConfig {
        id: id.ok_or(StartupError::MissingEnv(id_var))?,
        port: port.ok_or(StartupError::MissingEnv(port_var))?,
    })
}

fn default_cameras() -> Vec<CameraConfig> {
    [("front", 0), ("top", 1)]
        .into_iter()
        .map(|(name, index)| CameraConfig {
            name: name.to_string(),
            index_or_path: CameraSource::Index(index),
            width: default_camera_width(),
            height: default_camera_height(),
            fps: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn arm_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("ID_FOLLOWER", "follower_arm".to_string()),
            ("ID_LEADER", "leader_arm".to_string()),
            ("PORT_FOLLOWER", "/dev/ttyACM0".to_string()),
            ("PORT_LEADER", "/dev/ttyACM1".to_string()),
        ])
    }

    #[test]
    fn defaults_match_recording_constants() {
        let env = arm_env();
        let config =
            RecordConfig::resolve(FileConfig::default(), |k| env.get(k).cloned(), "/data".into())
                .unwrap();
        assert_eq!(config.fps, 30);
        assert_eq!(config.episode_time, Duration::from_secs(60));
        assert_eq!(config.checkpoint_every, 5);
        assert!(config.play_sounds);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].index_or_path, CameraSource::Index(1));
        assert_eq!(config.cameras[0].fps, Some(30));
        assert_eq!(config.follower.port, "/dev/ttyACM0");
        assert_eq!(config.bridge.command, DEFAULT_BRIDGE_COMMAND);
        assert_eq!(config.bridge.response_timeout(), Duration::from_millis(500));
        assert_eq!(config.bridge.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_arm_variable_is_reported_by_name() {
        let mut env = arm_env();
        env.remove("PORT_LEADER");
        let err =
            RecordConfig::resolve(FileConfig::default(), |k| env.get(k).cloned(), "/data".into())
                .unwrap_err();
        assert!(matches!(err, StartupError::MissingEnv("PORT_LEADER")));
    }

    #[test]
    fn environment_overrides_file_arms() {
        let raw = r#"
fps = 15
episode_time_s = 20

[follower]
id = "file_follower"
port = "/dev/file0"

[leader]
id = "file_leader"
port = "/dev/file1"

[[cameras]]
name = "wrist"
index_or_path = "/dev/video4"
"#;
        let file: FileConfig = toml::from_str(raw).unwrap();
        let env = HashMap::from([("ID_FOLLOWER", "env_follower".to_string())]);
        let config = RecordConfig::resolve(file, |k| env.get(k).cloned(), "/data".into()).unwrap();
        assert_eq!(config.follower.id, "env_follower");
        assert_eq!(config.follower.port, "/dev/file0");
        assert_eq!(config.leader.id, "file_leader");
        assert_eq!(config.episode_time, Duration::from_secs(20));
        assert_eq!(config.cameras.len(), 1);
        assert_eq!(
            config.cameras[0].index_or_path,
            CameraSource::Path("/dev/video4".to_string())
        );
        assert_eq!(config.cameras[0].fps, Some(15));
        assert_eq!(config.frame_period(), Duration::from_secs(1) / 15);
    }

    #[test]
    fn file_window_and_fps_are_clamped() {
        let env = arm_env();
        let file = FileConfig {
            fps: Some(0),
            episode_time_s: Some(u64::MAX),
            ..FileConfig::default()
        };
        let config = RecordConfig::resolve(file, |k| env.get(k).cloned(), "/data".into()).unwrap();
        assert_eq!(config.fps, 1);
        assert_eq!(config.episode_time, Duration::from_secs(MAX_EPISODE_TIME_S));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let parsed: Result<FileConfig, _> = toml::from_str("robot_typo = 1");
        assert!(parsed.is_err());
    }
}
