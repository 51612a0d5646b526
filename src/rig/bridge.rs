use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Frame, Rig, RigInfo};
use crate::config::{ArmConfig, BridgeConfig, CameraConfig};
use crate::error::CaptureError;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Connect {
        fps: u32,
        follower: &'a ArmConfig,
        leader: &'a ArmConfig,
        cameras: &'a [CameraConfig],
    },
    Step,
    Observe,
    Disconnect,
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    frame: Option<Frame>,
    #[serde(default)]
    robot_type: Option<String>,
    #[serde(default)]
    features: Option<Map<String, Value>>,
}

struct BridgeProcess {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<io::Result<String>>,
}

impl BridgeProcess {
    fn kill(mut self) {
        if let Err(err) = self.child.kill() {
            debug!("rig bridge already gone: {err}");
        }
        let _ = self.child.wait();
    }
}

/// [`Rig`] backed by a helper process that wraps the robotics library and
/// speaks newline-delimited JSON on stdin/stdout.
///
/// Every reply is awaited with a deadline. A bridge that stays silent is
/// killed and reported as [`CaptureError::Timeout`]; the next `step` or
/// `observe` starts a fresh bridge and connects again.
pub struct BridgeRig {
    bridge: BridgeConfig,
    fps: u32,
    follower: ArmConfig,
    leader: ArmConfig,
    cameras: Vec<CameraConfig>,
    process: Option<BridgeProcess>,
    connected: bool,
}

impl BridgeRig {
    pub fn new(
        bridge: BridgeConfig,
        fps: u32,
        follower: ArmConfig,
        leader: ArmConfig,
        cameras: Vec<CameraConfig>,
    ) -> Self {
        Self {
            bridge,
            fps,
            follower,
            leader,
            cameras,
            process: None,
            connected: false,
        }
    }

    fn spawn(&self) -> Result<BridgeProcess, CaptureError> {
        let mut child = ProcessCommand::new(&self.bridge.command)
            .args(&self.bridge.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(CaptureError::Spawn)?;
        let stdin = child.stdin.take().ok_or(CaptureError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(CaptureError::Disconnected)?;
        info!(
            "spawned rig bridge `{}` (pid {})",
            self.bridge.command,
            child.id()
        );
        Ok(BridgeProcess {
            child,
            stdin,
            replies: spawn_reply_reader(stdout),
        })
    }

    fn call(&mut self, request: &Request<'_>, timeout: Duration) -> Result<Response, CaptureError> {
        let process = self.process.as_mut().ok_or(CaptureError::Disconnected)?;
        let line = serde_json::to_string(request)
            .map_err(|err| CaptureError::Protocol(err.to_string()))?;
        writeln!(process.stdin, "{line}")?;
        process.stdin.flush()?;

        let reply = match process.replies.recv_timeout(timeout) {
            Ok(reply) => reply?,
            Err(RecvTimeoutError::Timeout) => {
                warn!("rig bridge silent for {timeout:?}, killing it");
                self.drop_process();
                return Err(CaptureError::Timeout(timeout));
            }
            Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::Disconnected),
        };
        let response: Response = serde_json::from_str(reply.trim())
            .map_err(|err| CaptureError::Protocol(format!("{err}: {}", reply.trim())))?;
        if !response.ok {
            return Err(CaptureError::Rig(
                response
                    .error
                    .unwrap_or_else(|| "unspecified bridge error".to_string()),
            ));
        }
        Ok(response)
    }

    fn call_for_frame(&mut self, request: &Request<'_>) -> Result<Frame, CaptureError> {
        if self.process.is_none() && self.connected {
            info!("restarting rig bridge");
            self.connect()?;
        }
        self.call(request, self.bridge.response_timeout())?
            .frame
            .ok_or_else(|| CaptureError::Protocol("response is missing `frame`".to_string()))
    }

    fn drop_process(&mut self) {
        if let Some(process) = self.process.take() {
            process.kill();
        }
    }
}

/// Forwards stdout lines to a channel so replies can be awaited with a
/// deadline. The channel closes at EOF.
fn spawn_reply_reader(stdout: ChildStdout) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err));
                    break;
                }
            }
        }
    });
    rx
}

impl Rig for BridgeRig {
    fn connect(&mut self) -> Result<RigInfo, CaptureError> {
        if self.process.is_none() {
            self.process = Some(self.spawn()?);
        }
        let follower = self.follower.clone();
        let leader = self.leader.clone();
        let cameras = self.cameras.clone();
        let response = self.call(
            &Request::Connect {
                fps: self.fps,
                follower: &follower,
                leader: &leader,
                cameras: &cameras,
            },
            self.bridge.connect_timeout(),
        )?;
        self.connected = true;
        let info = RigInfo {
            robot_type: response.robot_type.unwrap_or_default(),
            features: response.features.unwrap_or_default(),
        };
        info!(
            "rig connected: robot_type={} follower={} leader={}",
            info.robot_type, follower.id, leader.id
        );
        Ok(info)
    }

    fn step(&mut self) -> Result<Frame, CaptureError> {
        self.call_for_frame(&Request::Step)
    }

    fn observe(&mut self) -> Result<Frame, CaptureError> {
        self.call_for_frame(&Request::Observe)
    }

    fn disconnect(&mut self) -> Result<(), CaptureError> {
        self.connected = false;
        if self.process.is_none() {
            return Ok(());
        }
        let result = self
            .call(&Request::Disconnect, self.bridge.response_timeout())
            .map(|_| ());
        if let Some(mut process) = self.process.take() {
            drop(process.stdin);
            match process.child.wait() {
                Ok(status) => debug!("rig bridge exited with {status}"),
                Err(err) => warn!("failed waiting on rig bridge: {err}"),
            }
        }
        result
    }
}

impl Drop for BridgeRig {
    fn drop(&mut self) {
        self.drop_process();
    }
}
