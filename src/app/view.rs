use std::time::Duration;

use anyhow::Result;

use crate::pgn::{Move, MoveList};
use crate::rig::Frame;

use super::session::SessionState;

/// Rendering side of the session. The terminal UI implements it; tests use a
/// recorder of what would have been shown.
pub(crate) trait SessionView {
    fn show_move(&mut self, moves: &MoveList, state: &SessionState, status: &str) -> Result<()>;

    fn show_recording(
        &mut self,
        mv: &Move,
        state: &SessionState,
        elapsed: Duration,
        window: Duration,
    ) -> Result<()>;

    fn show_preview(&mut self, prompt: &str, frame: Option<&Frame>) -> Result<()>;
}

pub(crate) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(crate) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}
