mod render;
mod session;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::pgn::{Move, MoveList};
use crate::rig::Frame;

use super::session::SessionState;
use super::view::SessionView;
use super::wait::{KeySource, SessionKey};

use self::render::{MoveScreen, draw_move, draw_preview};
use self::session::TerminalGuard;

/// Full-screen ratatui view over crossterm.
pub(crate) struct TerminalView {
    guard: TerminalGuard,
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalView {
    pub(crate) fn enter() -> Result<Self> {
        let guard = TerminalGuard::enter()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .context("failed to initialize terminal backend")?;
        terminal.clear()?;
        Ok(Self { guard, terminal })
    }

    pub(crate) fn leave(mut self) -> Result<()> {
        self.terminal.show_cursor()?;
        self.guard.leave()
    }
}

impl SessionView for TerminalView {
    fn show_move(&mut self, moves: &MoveList, state: &SessionState, status: &str) -> Result<()> {
        let mv = moves
            .get(state.cursor)
            .with_context(|| format!("cursor {} outside move list", state.cursor))?;
        self.terminal
            .draw(|frame| draw_move(frame, mv, state, MoveScreen::Viewing { status }))?;
        Ok(())
    }

    fn show_recording(
        &mut self,
        mv: &Move,
        state: &SessionState,
        elapsed: Duration,
        window: Duration,
    ) -> Result<()> {
        self.terminal.draw(|frame| {
            draw_move(frame, mv, state, MoveScreen::Recording { elapsed, window })
        })?;
        Ok(())
    }

    fn show_preview(&mut self, prompt: &str, sample: Option<&Frame>) -> Result<()> {
        self.terminal
            .draw(|frame| draw_preview(frame, prompt, sample))?;
        Ok(())
    }
}

/// Keyboard input from the controlling terminal.
pub(crate) struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<SessionKey>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        Ok(map_key(key))
    }
}

pub(crate) fn map_key(key: KeyEvent) -> Option<SessionKey> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let mapped = match key.code {
        KeyCode::Char('g') | KeyCode::Char('G') => SessionKey::Record,
        KeyCode::Char('w') | KeyCode::Char('W') => SessionKey::Next,
        KeyCode::Char('b') | KeyCode::Char('B') => SessionKey::Previous,
        KeyCode::Char('q') | KeyCode::Char('Q') => SessionKey::Quit,
        KeyCode::Right => SessionKey::EndEarly,
        KeyCode::Left => SessionKey::Rerecord,
        KeyCode::Enter => SessionKey::Confirm,
        _ => SessionKey::Other,
    };
    Some(mapped)
}
