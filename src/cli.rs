use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use shakmaty::Color;

use crate::config::{MAX_EPISODE_TIME_S, MAX_FPS};

#[derive(Debug, Parser)]
#[command(
    name = "lechess-record",
    version,
    about = "Record one teleoperation episode per chess move of a PGN game"
)]
pub struct Cli {
    /// PGN file whose first game is recorded.
    #[arg(long = "pgn_path")]
    pub pgn_path: PathBuf,

    /// Dataset identifier, e.g. `user/chess_moves`.
    #[arg(long = "repo_id")]
    pub repo_id: String,

    /// Which side's moves to record.
    #[arg(long, value_enum)]
    pub color: Side,

    /// Upload the dataset to the hub once the session ends.
    #[arg(long = "push_to_hub", default_value_t = false)]
    pub push_to_hub: bool,

    /// Config file; defaults to `<config dir>/lechess/record.toml` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Capture window per episode, in seconds.
    #[arg(long = "episode_time_s", value_parser = clap::value_parser!(u64).range(1..=MAX_EPISODE_TIME_S))]
    pub episode_time_s: Option<u64>,

    /// Teleoperation frame rate.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_FPS)))]
    pub fps: Option<u32>,

    /// Overwrite an existing local dataset without asking.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}
