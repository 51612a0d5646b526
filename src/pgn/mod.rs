mod visitor;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pgn_reader::Reader;
use shakmaty::{Color, Square};

use crate::error::StartupError;

use self::visitor::MainlineVisitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrow {
    pub from: Square,
    pub to: Square,
}

/// One mainline move of the loaded game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    /// Position in the filtered list.
    pub index: usize,
    /// 0-based half-move number in the full game.
    pub ply: usize,
    pub color: Color,
    pub san: String,
    /// Position before the move is played.
    pub fen: String,
    pub arrow: Option<Arrow>,
}

impl Move {
    pub fn task(&self) -> String {
        format!("FEN: {} $$ MOVE: {}", self.fen, self.san)
    }
}

#[derive(Debug, Clone)]
pub struct MoveList {
    color: Color,
    moves: Vec<Move>,
}

impl MoveList {
    pub fn from_moves(moves: Vec<Move>, color: Color) -> Self {
        let moves = moves
            .into_iter()
            .filter(|m| m.color == color)
            .enumerate()
            .map(|(index, m)| Move { index, ..m })
            .collect();
        Self { color, moves }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Move> {
        self.moves.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

pub fn load_move_list(path: &Path, color: Color) -> Result<MoveList, StartupError> {
    let file = File::open(path).map_err(|source| StartupError::PgnRead {
        path: path.to_path_buf(),
        source,
    })?;
    let moves = read_mainline(BufReader::new(file), path)?;
    Ok(MoveList::from_moves(moves, color))
}

fn read_mainline<R: Read>(input: R, path: &Path) -> Result<Vec<Move>, StartupError> {
    let mut reader = Reader::new(input);
    match reader.read_game(&mut MainlineVisitor) {
        Ok(Some(result)) => result,
        Ok(None) => Err(StartupError::PgnEmpty(path.to_path_buf())),
        Err(source) => Err(StartupError::PgnRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}
