mod app;
mod cli;
mod config;
mod dataset;
mod error;
mod http;
mod logging;
mod paths;
mod pgn;
mod rig;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
