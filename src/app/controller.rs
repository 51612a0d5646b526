use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};

use crate::dataset::{EpisodeSink, FinishedEpisode};
use crate::error::CaptureError;
use crate::pgn::{Move, MoveList, color_name};
use crate::rig::Rig;

use super::recorder::{Episode, EpisodeEnd, Recorder};
use super::session::{Phase, SessionState, checkpoint_due};
use super::view::{SessionView, status_error, status_info};
use super::voice::Announcer;
use super::wait::{Clock, KeySource, SessionKey, WaitOutcome, wait_until};

const VIEW_POLL: Duration = Duration::from_millis(200);

pub(crate) const START_PROMPT: &str = "Check the scene and press Enter to start.";
pub(crate) const CHECKPOINT_PROMPT: &str =
    "Please modify the lighting and chessboard position, then press Enter.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionSummary {
    pub(crate) recorded: u32,
    pub(crate) discarded: u32,
    pub(crate) capture_failures: u32,
}

/// Drives the move-by-move loop: navigation, recording, re-recording and the
/// periodic setup checkpoint.
pub(crate) struct Session<'a> {
    pub(crate) moves: &'a MoveList,
    pub(crate) rig: &'a mut dyn Rig,
    pub(crate) keys: &'a mut dyn KeySource,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) view: &'a mut dyn SessionView,
    pub(crate) sink: &'a mut dyn EpisodeSink,
    pub(crate) voice: &'a Announcer,
    pub(crate) recorder: Recorder,
    pub(crate) checkpoint_every: u32,
}

impl<'a> Session<'a> {
    pub(crate) fn run(mut self) -> Result<SessionSummary> {
        let mut state = SessionState::new(self.moves.len()).context("no moves to record")?;
        let mut summary = SessionSummary {
            recorded: 0,
            discarded: 0,
            capture_failures: 0,
        };

        self.preview(START_PROMPT)?;
        let mut status = status_info("Ready.");

        while state.phase != Phase::Terminated {
            self.view.show_move(self.moves, &state, &status)?;

            let Some(key) = self.keys.poll_key(VIEW_POLL)? else {
                continue;
            };

            match key {
                SessionKey::Record => {
                    let (next_state, next_status) = self.record_move(state, &mut summary)?;
                    state = next_state;
                    status = next_status;
                }
                SessionKey::Next => {
                    let moved = state.next();
                    status = if state.is_last() {
                        status_info("Already at the last move.")
                    } else {
                        status_info(&format!("Move {}/{}", moved.cursor + 1, moved.len))
                    };
                    info!("navigate next -> {}", moved.cursor);
                    state = moved;
                }
                SessionKey::Previous => {
                    let moved = state.prev();
                    status = if state.is_first() {
                        status_info("Already at the first move.")
                    } else {
                        status_info(&format!("Move {}/{}", moved.cursor + 1, moved.len))
                    };
                    info!("navigate previous -> {}", moved.cursor);
                    state = moved;
                }
                SessionKey::Quit => {
                    info!("operator quit at move {}", state.cursor + 1);
                    state = state.quit();
                }
                _ => {
                    status = status_error(
                        "Invalid input. Press 'g' to record, 'w' for next, 'b' for previous, or 'q' to quit.",
                    );
                }
            }
        }

        summary.recorded = state.recorded;
        self.voice.say_blocking("Stop recording");
        Ok(summary)
    }

    fn current_move(&self, state: &SessionState) -> Result<&'a Move> {
        let moves: &'a MoveList = self.moves;
        moves
            .get(state.cursor)
            .with_context(|| format!("cursor {} outside move list", state.cursor))
    }

    fn record_move(
        &mut self,
        state: SessionState,
        summary: &mut SessionSummary,
    ) -> Result<(SessionState, String)> {
        let mv = self.current_move(&state)?;
        let state = state.start_recording();
        let mut rerecords = 0;

        loop {
            info!(
                "recording move {} ({}) task: {}",
                state.cursor + 1,
                mv.san,
                mv.task()
            );
            self.voice
                .say(&format!("Recording move {} of {}", state.cursor + 1, state.len));

            let episode = match self.recorder.capture(
                mv,
                &state,
                rerecords,
                &mut *self.rig,
                &mut *self.keys,
                self.clock,
                &mut *self.view,
            ) {
                Ok(episode) => episode,
                Err(err) => match err.downcast::<CaptureError>() {
                    Ok(capture) => {
                        error!("capture failed for move {}: {capture}", mv.san);
                        summary.capture_failures += 1;
                        return Ok((
                            state.abort_recording(),
                            status_error(&format!(
                                "Capture failed, episode discarded: {capture}"
                            )),
                        ));
                    }
                    Err(other) => return Err(other),
                },
            };

            if episode.is_discarded() {
                self.voice.say("Re-record episode");
                info!(
                    "discarded {} frames for move {}",
                    episode.frames.len(),
                    mv.san
                );
                summary.discarded += 1;
                rerecords += 1;
                continue;
            }

            return self.finalize(state, episode);
        }
    }

    /// Attaches the move's chess metadata to the episode, hands it to the
    /// dataset and advances the cursor.
    fn finalize(&mut self, state: SessionState, episode: Episode) -> Result<(SessionState, String)> {
        let mv = self.current_move(&state)?;
        let finished = FinishedEpisode {
            move_index: mv.index,
            ply: mv.ply,
            color: color_name(mv.color),
            fen: mv.fen.clone(),
            san: mv.san.clone(),
            task: mv.task(),
            duration: episode.duration,
            ended_early: episode.end == EpisodeEnd::EndedEarly,
            rerecords: episode.rerecords,
            recorded_at: Utc::now(),
            frames: episode.frames,
        };

        let index = match self.sink.save_episode(&finished) {
            Ok(index) => index,
            Err(err) => {
                error!("failed to save episode for move {}: {err:#}", finished.san);
                return Ok((
                    state.abort_recording(),
                    status_error(&format!("Saving failed, episode discarded: {err}")),
                ));
            }
        };

        let mut next = state.finalize();
        let status = status_info(&format!(
            "Saved episode {index} for {} ({:.1}s).",
            finished.san,
            finished.duration.as_secs_f64()
        ));

        if next.phase != Phase::Terminated && checkpoint_due(next.recorded, self.checkpoint_every) {
            info!("checkpoint after {} episodes", next.recorded);
            self.voice
                .say("Please modify the lighting and chessboard position");
            self.preview(CHECKPOINT_PROMPT)?;
            next = next.checkpoint_taken();
        }

        Ok((next, status))
    }

    /// Streams rig observations until the operator confirms with Enter.
    fn preview(&mut self, prompt: &str) -> Result<()> {
        let period = self.recorder.frame_period;
        let mut warned = false;
        loop {
            let frame = match self.rig.observe() {
                Ok(frame) => Some(frame),
                Err(err) => {
                    if !warned {
                        warn!("observation preview failed: {err}");
                        warned = true;
                    }
                    None
                }
            };
            self.view.show_preview(prompt, frame.as_ref())?;

            let deadline = self.clock.now() + period;
            if let WaitOutcome::Cancelled(_) =
                wait_until(self.clock, &mut *self.keys, deadline, |key| {
                    key == SessionKey::Confirm
                })?
            {
                return Ok(());
            }
        }
    }
}
