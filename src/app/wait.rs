use std::time::{Duration, Instant};

use anyhow::Result;

/// Operator input, already mapped from raw key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKey {
    Record,
    Next,
    Previous,
    Quit,
    EndEarly,
    Rerecord,
    Confirm,
    Other,
}

pub(crate) trait KeySource {
    /// Blocks for at most `timeout` and returns the first key pressed, if any.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<SessionKey>>;
}

/// Monotonic time since the session started.
pub(crate) trait Clock {
    fn now(&self) -> Duration;
}

pub(crate) struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub(crate) fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Elapsed,
    Cancelled(SessionKey),
}

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Waits until `deadline` on `clock`. Any key accepted by `cancels` ends the
/// wait early; other keys are swallowed. Cancellation is checked every
/// `POLL_INTERVAL` at most.
pub(crate) fn wait_until<F>(
    clock: &dyn Clock,
    keys: &mut dyn KeySource,
    deadline: Duration,
    cancels: F,
) -> Result<WaitOutcome>
where
    F: Fn(SessionKey) -> bool,
{
    loop {
        let now = clock.now();
        if now >= deadline {
            return Ok(WaitOutcome::Elapsed);
        }
        let timeout = (deadline - now).min(POLL_INTERVAL);
        if let Some(key) = keys.poll_key(timeout)?
            && cancels(key)
        {
            return Ok(WaitOutcome::Cancelled(key));
        }
    }
}
