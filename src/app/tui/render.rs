use std::time::Duration;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, Wrap,
};
use serde_json::Value;
use shakmaty::{Board, File, Piece, Rank, Role, Square};

use crate::pgn::{Arrow, Move, color_name};
use crate::rig::Frame as RigFrame;

use super::super::session::SessionState;

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const LIGHT_SQUARE: Color = Color::Rgb(240, 217, 181);
const DARK_SQUARE: Color = Color::Rgb(181, 136, 99);
const ARROW_FROM: Color = Color::Rgb(205, 210, 106);
const ARROW_TO: Color = Color::Rgb(170, 162, 58);

/// What the move screen is doing right now.
#[derive(Clone, Copy)]
pub(super) enum MoveScreen<'a> {
    Viewing { status: &'a str },
    Recording { elapsed: Duration, window: Duration },
}

pub(super) fn draw_move(frame: &mut Frame, mv: &Move, state: &SessionState, screen: MoveScreen<'_>) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let recording = matches!(screen, MoveScreen::Recording { .. });
    let mode = if recording {
        Span::styled(
            "● REC",
            Style::default()
                .fg(Color::Rgb(255, 90, 90))
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("VIEW", Style::default().fg(Color::Yellow))
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "LECHESS",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            format!("move {}/{}", state.cursor + 1, state.len),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        Span::styled(color_name(mv.color), Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(
            format!("{} recorded", state.recorded),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        mode,
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Session"));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(30)])
        .split(chunks[1]);

    let board = Paragraph::new(board_lines(&mv.fen, mv.color, mv.arrow)).block(panel_block("Board"));
    frame.render_widget(board, body[0]);

    let details = Paragraph::new(vec![
        Line::from(Span::styled("Move", Style::default().fg(ACCENT))),
        Line::from(Span::styled(
            mv.san.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::from(Span::styled("Ply", Style::default().fg(ACCENT))),
        Line::raw((mv.ply + 1).to_string()),
        Line::raw(""),
        Line::from(Span::styled("FEN", Style::default().fg(ACCENT))),
        Line::raw(mv.fen.clone()),
    ])
    .style(Style::default().fg(Color::Rgb(230, 230, 230)))
    .wrap(Wrap { trim: true })
    .block(panel_block("Position"));
    frame.render_widget(details, body[1]);

    let (ratio, label, gauge_title) = match screen {
        MoveScreen::Recording { elapsed, window } => (
            ratio(elapsed.as_secs_f64(), window.as_secs_f64()),
            format!("{:.1}s / {:.0}s", elapsed.as_secs_f64(), window.as_secs_f64()),
            "Recording",
        ),
        MoveScreen::Viewing { .. } => (
            ratio(state.recorded as f64, state.len as f64),
            format!("{} of {} moves recorded", state.recorded, state.len),
            "Progress",
        ),
    };
    let gauge = Gauge::default()
        .block(panel_block(gauge_title))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(ratio);
    frame.render_widget(gauge, chunks[2]);

    let status_text = match screen {
        MoveScreen::Viewing { status } => status.to_string(),
        MoveScreen::Recording { .. } => format!("INFO: Recording task: {}", mv.task()),
    };
    let status_widget = Paragraph::new(status_text.clone())
        .style(status_style(&status_text))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    let hints = if recording {
        key_hint_line(&[("→", "end early"), ("←", "re-record")])
    } else {
        key_hint_line(&[("g", "record"), ("w", "next"), ("b", "previous"), ("q", "quit")])
    };
    let controls = Paragraph::new(hints)
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[4]);
}

pub(super) fn draw_preview(frame: &mut Frame, prompt: &str, sample: Option<&RigFrame>) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let area = centered_fixed_rect(72, 24, frame.area());
    frame.render_widget(Clear, area);
    let block = modal_block("Setup Check");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(inner);

    let prompt_widget = Paragraph::new(prompt.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Rgb(230, 235, 242)));
    frame.render_widget(prompt_widget, chunks[0]);

    let Some(sample) = sample else {
        let waiting = Paragraph::new("Waiting for observation...")
            .alignment(Alignment::Center)
            .style(status_style("ERROR:"));
        frame.render_widget(waiting, chunks[1]);
        return;
    };

    let rows: Vec<Row> = sample
        .observation
        .iter()
        .map(|(key, value)| {
            Row::new(vec![
                Cell::from(key.clone()),
                Cell::from(observation_value_text(value)),
            ])
        })
        .collect();
    let table = Table::new(rows, [Constraint::Percentage(55), Constraint::Percentage(45)])
        .header(
            Row::new(vec!["Observation", "Value"])
                .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        );
    frame.render_widget(table, chunks[1]);
}

/// Board as seen from the mover's side, with the move's squares highlighted.
pub(super) fn board_lines(
    fen: &str,
    orientation: shakmaty::Color,
    arrow: Option<Arrow>,
) -> Vec<Line<'static>> {
    let placement = fen.split_whitespace().next().unwrap_or_default();
    let board = Board::from_ascii_board_fen(placement.as_bytes()).unwrap_or_else(|_| Board::empty());

    let white_view = orientation == shakmaty::Color::White;
    let ranks: Vec<Rank> = if white_view {
        Rank::ALL.into_iter().rev().collect()
    } else {
        Rank::ALL.into_iter().collect()
    };
    let files: Vec<File> = if white_view {
        File::ALL.into_iter().collect()
    } else {
        File::ALL.into_iter().rev().collect()
    };

    let mut lines = Vec::with_capacity(9);
    for rank in &ranks {
        let mut spans = vec![Span::styled(
            format!("{} ", rank.char()),
            Style::default().fg(MUTED),
        )];
        for file in &files {
            let square = Square::from_coords(*file, *rank);
            let square_bg = match arrow {
                Some(arrow) if arrow.from == square => ARROW_FROM,
                Some(arrow) if arrow.to == square => ARROW_TO,
                _ if square.is_light() => LIGHT_SQUARE,
                _ => DARK_SQUARE,
            };
            let glyph = board.piece_at(square).map(piece_glyph).unwrap_or(' ');
            spans.push(Span::styled(
                format!(" {glyph} "),
                Style::default().bg(square_bg).fg(Color::Black),
            ));
        }
        lines.push(Line::from(spans));
    }

    let mut footer = String::from("  ");
    for file in &files {
        footer.push(' ');
        footer.push(file.char());
        footer.push(' ');
    }
    lines.push(Line::from(Span::styled(footer, Style::default().fg(MUTED))));
    lines
}

pub(super) fn piece_glyph(piece: Piece) -> char {
    match (piece.color, piece.role) {
        (shakmaty::Color::White, Role::King) => '♔',
        (shakmaty::Color::White, Role::Queen) => '♕',
        (shakmaty::Color::White, Role::Rook) => '♖',
        (shakmaty::Color::White, Role::Bishop) => '♗',
        (shakmaty::Color::White, Role::Knight) => '♘',
        (shakmaty::Color::White, Role::Pawn) => '♙',
        (shakmaty::Color::Black, Role::King) => '♚',
        (shakmaty::Color::Black, Role::Queen) => '♛',
        (shakmaty::Color::Black, Role::Rook) => '♜',
        (shakmaty::Color::Black, Role::Bishop) => '♝',
        (shakmaty::Color::Black, Role::Knight) => '♞',
        (shakmaty::Color::Black, Role::Pawn) => '♟',
    }
}

pub(super) fn observation_value_text(value: &Value) -> String {
    match value {
        Value::Number(number) => number
            .as_f64()
            .map(|v| format!("{v:.3}"))
            .unwrap_or_else(|| number.to_string()),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => format!("[{} values]", items.len()),
        Value::Object(fields) => format!("{{{} fields}}", fields.len()),
        Value::Null => "-".to_string(),
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        (part / whole).clamp(0.0, 1.0)
    }
}

fn key_hint_line(hints: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(hints.len() * 3);
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {key} "), pill_active()));
        spans.push(Span::styled(format!(" {label}"), Style::default().fg(MUTED)));
        spans.push(Span::raw("   "));
    }
    Line::from(spans)
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn white_board_has_eighth_rank_on_top() {
        let lines = board_lines(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            shakmaty::Color::White,
            None,
        );
        assert_eq!(lines.len(), 9);
        assert_eq!(line_text(&lines[0]), "8  ♜  ♞  ♝  ♛  ♚  ♝  ♞  ♜ ");
        assert_eq!(line_text(&lines[8]), "   a  b  c  d  e  f  g  h ");
    }

    #[test]
    fn black_board_is_flipped() {
        let lines = board_lines(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1",
            shakmaty::Color::Black,
            None,
        );
        assert!(line_text(&lines[0]).starts_with("1  ♖  ♘  ♗  ♔  ♕"));
        assert_eq!(line_text(&lines[8]), "   h  g  f  e  d  c  b  a ");
    }

    #[test]
    fn arrow_squares_are_highlighted() {
        let lines = board_lines(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            shakmaty::Color::White,
            Some(Arrow {
                from: Square::E2,
                to: Square::E4,
            }),
        );
        // Rank 2 is line 6, rank 4 is line 4; file e is span 5 (after the label).
        assert_eq!(lines[6].spans[5].style.bg, Some(ARROW_FROM));
        assert_eq!(lines[4].spans[5].style.bg, Some(ARROW_TO));
        assert_ne!(lines[6].spans[4].style.bg, Some(ARROW_FROM));
    }

    #[test]
    fn unreadable_fen_draws_empty_board() {
        let lines = board_lines("not-a-fen", shakmaty::Color::White, None);
        assert_eq!(line_text(&lines[0]), format!("8 {}", " ".repeat(24)));
    }

    #[test]
    fn observation_values_are_summarized() {
        assert_eq!(observation_value_text(&json!(1.23456)), "1.235");
        assert_eq!(observation_value_text(&json!([1, 2, 3])), "[3 values]");
        assert_eq!(observation_value_text(&json!(null)), "-");
        assert_eq!(observation_value_text(&json!("ok")), "ok");
    }
}
