mod controller;
mod recorder;
mod session;
mod tui;
mod view;
mod voice;
mod wait;


use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use shakmaty::Color;

use crate::cli::Cli;
use crate::config::{FileConfig, RecordConfig};
use crate::dataset::{HubClient, LocalDataset, publish, validate_repo_id};
use crate::logging;
use crate::paths::{default_config_file_path, default_dataset_root};
use crate::pgn::{MoveList, color_name, load_move_list};
use crate::rig::{BridgeRig, Rig};

use self::controller::{Session, SessionSummary};
use self::recorder::Recorder;
use self::tui::{TerminalKeys, TerminalView};
use self::voice::Announcer;
use self::wait::MonotonicClock;

pub fn run(cli: Cli) -> Result<()> {
    validate_repo_id(&cli.repo_id)?;
    let config = load_config(&cli)?;
    let _logger = logging::init(&config.log_level)?;
    let color = Color::from(cli.color);
    info!(
        "session start: pgn={} repo_id={} color={}",
        cli.pgn_path.display(),
        cli.repo_id,
        color_name(color)
    );

    let moves = load_move_list(&cli.pgn_path, color)?;
    if moves.is_empty() {
        println!(
            "No {} moves found in {}. Nothing to record.",
            color_name(color),
            cli.pgn_path.display()
        );
        return Ok(());
    }
    println!("Found {} moves for {}", moves.len(), color_name(moves.color()));
    for mv in moves.iter() {
        debug!("move {}: {} from {}", mv.index + 1, mv.san, mv.fen);
    }

    let dataset_dir = LocalDataset::dataset_dir(&config.dataset_root, &cli.repo_id)?;
    if dataset_dir.exists() {
        let remove = cli.yes || {
            let stdin = io::stdin();
            confirm_overwrite(&dataset_dir, &mut stdin.lock(), &mut io::stdout())?
        };
        if !remove {
            println!("Dataset not deleted");
            return Ok(());
        }
        fs::remove_dir_all(&dataset_dir)
            .with_context(|| format!("failed to delete {}", dataset_dir.display()))?;
        info!("deleted existing dataset {}", dataset_dir.display());
    }

    let mut rig = BridgeRig::new(
        config.bridge.clone(),
        config.fps,
        config.follower.clone(),
        config.leader.clone(),
        config.cameras.clone(),
    );
    let rig_info = rig.connect().context("failed to connect to the robot rig")?;
    info!("rig connected: {}", rig_info.robot_type);

    let mut dataset =
        LocalDataset::create(&config.dataset_root, &cli.repo_id, config.fps, &rig_info)?;

    let summary = record_session(&config, &moves, &mut rig, &mut dataset);

    if let Err(err) = rig.disconnect() {
        warn!("rig disconnect failed: {err}");
    }
    let summary = summary?;
    info!(
        "session ended: {} recorded, {} discarded, {} capture failures",
        summary.recorded, summary.discarded, summary.capture_failures
    );
    println!(
        "Recorded {} episodes into {}",
        dataset.total_episodes(),
        dataset.dir().display()
    );
    if summary.capture_failures > 0 {
        println!(
            "{} episodes were lost to capture failures; see the log for details.",
            summary.capture_failures
        );
    }

    if cli.push_to_hub {
        push_dataset(&dataset, &cli.pgn_path, color);
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<RecordConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| default_config_file_path().filter(|path| path.exists()));
    let mut file = match path {
        Some(path) => FileConfig::load(&path)?,
        None => FileConfig::default(),
    };
    if cli.fps.is_some() {
        file.fps = cli.fps;
    }
    if cli.episode_time_s.is_some() {
        file.episode_time_s = cli.episode_time_s;
    }
    Ok(RecordConfig::resolve(
        file,
        |var| std::env::var(var).ok(),
        default_dataset_root()?,
    )?)
}

/// Runs the interactive session on the full-screen terminal. The terminal is
/// restored before returning, whatever the outcome.
fn record_session(
    config: &RecordConfig,
    moves: &MoveList,
    rig: &mut dyn Rig,
    dataset: &mut LocalDataset,
) -> Result<SessionSummary> {
    let mut view = TerminalView::enter()?;
    let mut keys = TerminalKeys;
    let clock = MonotonicClock::start();
    let voice = Announcer::new(config.play_sounds);

    let outcome = Session {
        moves,
        rig,
        keys: &mut keys,
        clock: &clock,
        view: &mut view,
        sink: dataset,
        voice: &voice,
        recorder: Recorder {
            window: config.episode_time,
            frame_period: config.frame_period(),
        },
        checkpoint_every: config.checkpoint_every,
    }
    .run();

    view.leave()?;
    outcome
}

fn push_dataset(dataset: &LocalDataset, pgn_path: &Path, color: Color) {
    println!("Pushing {} to the hub...", dataset.repo_id());
    let result =
        HubClient::from_env().and_then(|client| publish(dataset, pgn_path, color_name(color), &client));
    match result {
        Ok(()) => {
            info!("pushed dataset {}", dataset.repo_id());
            println!("Dataset pushed to the hub as {}", dataset.repo_id());
        }
        Err(err) => {
            error!("push to hub failed: {err}");
            eprintln!("Push to hub failed: {err}");
            eprintln!("The local dataset is kept at {}", dataset.dir().display());
        }
    }
}

/// Asks whether an existing dataset directory may be deleted. Only `y` or
/// `yes` count as consent.
pub(crate) fn confirm_overwrite<R, W>(dir: &Path, input: &mut R, output: &mut W) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "Dataset already exists at {}", dir.display())?;
    write!(output, "Delete it? (y/n) ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
