use std::ops::ControlFlow;

use pgn_reader::{RawComment, RawTag, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

use super::{Arrow, Move};
use crate::error::StartupError;

/// Mainline-only PGN visitor (pgn-reader).
///
/// Replays every mainline move on a `shakmaty` board so each [`Move`] carries the
/// FEN of the position the operator has to set up, the normalized SAN and the
/// from/to arrow. Variations and comments are skipped. The first illegal move
/// breaks out of the game with an error.
pub(super) struct MainlineVisitor;

pub(super) struct Mainline {
    pos: Chess,
    moves: Vec<Move>,
}

impl Visitor for MainlineVisitor {
    type Tags = Option<Fen>;
    type Movetext = Mainline;
    type Output = Result<Vec<Move>, StartupError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(None)
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        if key != b"FEN" {
            return ControlFlow::Continue(());
        }
        match Fen::from_ascii(value.as_bytes()) {
            Ok(fen) => {
                *tags = Some(fen);
                ControlFlow::Continue(())
            }
            Err(err) => ControlFlow::Break(Err(StartupError::PgnSetup(format!(
                "{} ({err})",
                String::from_utf8_lossy(value.as_bytes())
            )))),
        }
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let pos = match tags {
            Some(fen) => match fen.into_position::<Chess>(CastlingMode::Standard) {
                Ok(pos) => pos,
                Err(err) => return ControlFlow::Break(Err(StartupError::PgnSetup(err.to_string()))),
            },
            None => Chess::default(),
        };
        ControlFlow::Continue(Mainline {
            pos,
            moves: Vec::with_capacity(128),
        })
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn comment(&mut self, _: &mut Self::Movetext, _: RawComment<'_>) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    fn san(&mut self, mainline: &mut Self::Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let ply = mainline.moves.len();
        let Ok(m) = san_plus.san.to_move(&mainline.pos) else {
            return ControlFlow::Break(Err(StartupError::PgnMove {
                ply: ply + 1,
                san: san_plus.to_string(),
            }));
        };

        let color = mainline.pos.turn();
        let fen = Fen::from_position(&mainline.pos, EnPassantMode::Legal).to_string();
        let arrow = m.from().map(|from| Arrow { from, to: m.to() });
        let san = SanPlus::from_move_and_play_unchecked(&mut mainline.pos, m);

        mainline.moves.push(Move {
            index: ply,
            ply,
            color,
            san: san.to_string(),
            fen,
            arrow,
        });
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, mainline: Self::Movetext) -> Self::Output {
        Ok(mainline.moves)
    }
}
