mod bridge;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CaptureError;

pub use bridge::BridgeRig;

/// One teleoperation sample as reported by the external control layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub observation: Map<String, Value>,
    #[serde(default)]
    pub action: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RigInfo {
    #[serde(default)]
    pub robot_type: String,
    #[serde(default)]
    pub features: Map<String, Value>,
}

/// The leader/follower pair plus cameras. Owned by the recorder for the
/// duration of an episode; the session controller never reads it directly.
pub trait Rig {
    fn connect(&mut self) -> Result<RigInfo, CaptureError>;

    /// Reads the leader, drives the follower and returns the resulting sample.
    fn step(&mut self) -> Result<Frame, CaptureError>;

    /// Reads the follower and cameras without teleoperating.
    fn observe(&mut self) -> Result<Frame, CaptureError>;

    fn disconnect(&mut self) -> Result<(), CaptureError>;
}
