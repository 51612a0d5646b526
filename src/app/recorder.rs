use std::time::Duration;

use anyhow::Result;

use crate::pgn::Move;
use crate::rig::{Frame, Rig};

use super::session::SessionState;
use super::view::SessionView;
use super::wait::{Clock, KeySource, SessionKey, WaitOutcome, wait_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EpisodeEnd {
    /// The full capture window ran out.
    Elapsed,
    /// The operator ended the capture with the right arrow.
    EndedEarly,
    /// The operator asked to record the same move again.
    Rerecord,
}

/// One capture attempt for a single move.
#[derive(Debug, Clone)]
pub(crate) struct Episode {
    pub(crate) frames: Vec<Frame>,
    pub(crate) duration: Duration,
    pub(crate) end: EpisodeEnd,
    /// Attempts discarded for this move before this one.
    pub(crate) rerecords: u32,
}

impl Episode {
    pub(crate) fn is_discarded(&self) -> bool {
        self.end == EpisodeEnd::Rerecord
    }
}

/// Teleoperates the rig for one episode and buffers its frames.
pub(crate) struct Recorder {
    pub(crate) window: Duration,
    pub(crate) frame_period: Duration,
}

impl Recorder {
    /// Runs the teleoperation loop until the window elapses or the operator
    /// presses right (end early) or left (re-record). Rig failures surface as
    /// [`crate::error::CaptureError`] inside the returned error.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn capture(
        &self,
        mv: &Move,
        state: &SessionState,
        rerecords: u32,
        rig: &mut dyn Rig,
        keys: &mut dyn KeySource,
        clock: &dyn Clock,
        view: &mut dyn SessionView,
    ) -> Result<Episode> {
        let start = clock.now();
        let deadline = start + self.window;
        let mut frames = Vec::new();

        let end = loop {
            let tick_start = clock.now();
            frames.push(rig.step()?);
            view.show_recording(mv, state, tick_start - start, self.window)?;

            let tick_deadline = (tick_start + self.frame_period).min(deadline);
            match wait_until(clock, keys, tick_deadline, |key| {
                matches!(key, SessionKey::EndEarly | SessionKey::Rerecord)
            })? {
                WaitOutcome::Cancelled(SessionKey::Rerecord) => break EpisodeEnd::Rerecord,
                WaitOutcome::Cancelled(_) => break EpisodeEnd::EndedEarly,
                WaitOutcome::Elapsed if clock.now() >= deadline => break EpisodeEnd::Elapsed,
                WaitOutcome::Elapsed => {}
            }
        };

        Ok(Episode {
            frames,
            duration: (clock.now() - start).min(self.window),
            end,
            rerecords,
        })
    }
}
