/*
  Matebook, a mate-in-N puzzle dataset builder and reward trainer.
  Copyright (C) 2022 Clayton Ramsey.

  Matebook is free software: you can redistribute it and/or modify
  it under the terms of the GNU General Public License as published by
  the Free Software Foundation, either version 3 of the License, or
  (at your option) any later version.

  Matebook is distributed in the hope that it will be useful,
  but WITHOUT ANY WARRANTY; without even the implied warranty of
  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
  GNU General Public License for more details.

  You should have received a copy of the GNU General Public License
  along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

//! Fine-tune a model to find checkmates, rewarding it only for legal mating moves.
//!
//! The model itself lives in a separate serving process, reached over HTTP.
//! Settings come from an optional TOML file, and any flag given on the command line overrides
//! the corresponding setting in the file.

#![warn(clippy::pedantic)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use matebook::{
    dataset::Theme,
    train::{self, HttpPolicy, TrainConfig},
    VERSION,
};

#[derive(Parser)]
#[command(name = "train", version = VERSION, about = "Train a model to solve mate-in-N puzzles")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the filtered dataset to train on
    #[arg(long)]
    data: Option<PathBuf>,

    /// Override the puzzle theme: `m1` or `m2`
    #[arg(long)]
    theme: Option<Theme>,

    /// Override the base URL of the model-serving process
    #[arg(long)]
    endpoint: Option<String>,

    /// Override the number of steps
    #[arg(long)]
    steps: Option<u64>,

    /// Override the seed for the order of positions
    #[arg(long)]
    seed: Option<u64>,

    /// Override the NDJSON file to append metrics to
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Override the directory under which checkpoints are written
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

impl Cli {
    /// Apply every override given on the command line to `config`.
    fn apply(self, config: &mut TrainConfig) {
        if let Some(data) = self.data {
            config.data = data;
        }
        if let Some(theme) = self.theme {
            config.theme = theme;
        }
        if let Some(endpoint) = self.endpoint {
            config.policy.endpoint = endpoint;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.metrics.is_some() {
            config.metrics = self.metrics;
        }
        if let Some(dir) = self.checkpoint_dir {
            config.checkpoint.dir = dir;
        }
    }
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let mut config = match cli.config.take() {
        Some(path) => TrainConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TrainConfig::default(),
    };
    cli.apply(&mut config);

    let mut session = train::init(config).context("failed to start training")?;
    info!("matebook {VERSION}");
    let mut policy = HttpPolicy::new(&session.config().policy)?;
    if let Some(last) = session.run(&mut policy)? {
        info!(
            "finished after {} steps with mean reward {:.3}",
            last.step, last.mean_reward
        );
    }
    session.finish()?;
    Ok(())
}
