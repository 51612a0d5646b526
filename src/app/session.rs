/// Where the session loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Viewing,
    Recording,
    Terminated,
}

/// Interactive session bookkeeping. Every transition takes the state by value
/// and returns the next one; the cursor always stays in `0..len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionState {
    pub(crate) cursor: usize,
    pub(crate) len: usize,
    pub(crate) recorded: u32,
    pub(crate) since_checkpoint: u32,
    pub(crate) phase: Phase,
}

impl SessionState {
    pub(crate) fn new(len: usize) -> Option<Self> {
        (len > 0).then_some(Self {
            cursor: 0,
            len,
            recorded: 0,
            since_checkpoint: 0,
            phase: Phase::Viewing,
        })
    }

    pub(crate) fn is_first(&self) -> bool {
        self.cursor == 0
    }

    pub(crate) fn is_last(&self) -> bool {
        self.cursor + 1 == self.len
    }

    /// Clamped: a no-op on the last move.
    pub(crate) fn next(self) -> Self {
        Self {
            cursor: (self.cursor + 1).min(self.len - 1),
            ..self
        }
    }

    /// Clamped: a no-op on the first move.
    pub(crate) fn prev(self) -> Self {
        Self {
            cursor: self.cursor.saturating_sub(1),
            ..self
        }
    }

    pub(crate) fn start_recording(self) -> Self {
        Self {
            phase: Phase::Recording,
            ..self
        }
    }

    /// Leaves `Recording` without saving anything.
    pub(crate) fn abort_recording(self) -> Self {
        Self {
            phase: Phase::Viewing,
            ..self
        }
    }

    /// Counts a saved episode and moves on. Saving the last move ends the session.
    pub(crate) fn finalize(self) -> Self {
        let recorded = Self {
            recorded: self.recorded + 1,
            since_checkpoint: self.since_checkpoint + 1,
            ..self
        };
        if self.is_last() {
            Self {
                phase: Phase::Terminated,
                ..recorded
            }
        } else {
            Self {
                cursor: self.cursor + 1,
                phase: Phase::Viewing,
                ..recorded
            }
        }
    }

    pub(crate) fn checkpoint_taken(self) -> Self {
        Self {
            since_checkpoint: 0,
            ..self
        }
    }

    pub(crate) fn quit(self) -> Self {
        Self {
            phase: Phase::Terminated,
            ..self
        }
    }
}

/// True on every `every`-th recorded episode.
pub(crate) fn checkpoint_due(recorded: u32, every: u32) -> bool {
    every > 0 && recorded > 0 && recorded % every == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_has_no_session() {
        assert!(SessionState::new(0).is_none());
    }

    #[test]
    fn navigation_clamps_at_both_ends() {
        let state = SessionState::new(3).unwrap();
        assert_eq!(state.prev().cursor, 0);

        let last = state.next().next();
        assert_eq!(last.cursor, 2);
        assert!(last.is_last());
        assert_eq!(last.next(), last);
        assert_eq!(last.prev().cursor, 1);
    }

    #[test]
    fn navigation_never_leaves_bounds() {
        for len in 1..6 {
            let mut state = SessionState::new(len).unwrap();
            for step in 0..(len * 3) {
                state = if step % 3 == 2 { state.prev() } else { state.next() };
                assert!(state.cursor < len);
            }
        }
    }

    #[test]
    fn single_move_list_is_first_and_last() {
        let state = SessionState::new(1).unwrap();
        assert!(state.is_first() && state.is_last());
        assert_eq!(state.next(), state);
        assert_eq!(state.prev(), state);
    }

    #[test]
    fn finalize_advances_and_counts() {
        let state = SessionState::new(3).unwrap().start_recording().finalize();
        assert_eq!(state.cursor, 1);
        assert_eq!(state.recorded, 1);
        assert_eq!(state.since_checkpoint, 1);
        assert_eq!(state.phase, Phase::Viewing);
    }

    #[test]
    fn finalize_on_last_move_terminates() {
        let state = SessionState::new(2)
            .unwrap()
            .next()
            .start_recording()
            .finalize();
        assert_eq!(state.phase, Phase::Terminated);
        assert_eq!(state.cursor, 1);
    }

    #[test]
    fn abort_keeps_cursor_and_counts() {
        let state = SessionState::new(4).unwrap().next();
        let aborted = state.start_recording().abort_recording();
        assert_eq!(aborted, state);
    }

    #[test]
    fn checkpoint_due_every_fifth_episode() {
        let due: Vec<u32> = (0..=15).filter(|n| checkpoint_due(*n, 5)).collect();
        assert_eq!(due, vec![5, 10, 15]);
        assert!(!checkpoint_due(0, 5));
        assert!(!checkpoint_due(3, 0));
    }
}
