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

//! Build a mate-in-N puzzle dataset from the Lichess puzzle dump.
//!
//! The dump is downloaded and decompressed next to the output, filtered down to the puzzles of
//! the chosen theme, and sorted by rating.
//! The intermediate files are removed once the dataset has been written.

#![warn(clippy::pedantic)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use matebook::{
    dataset::{self, BuildOptions, MalformedRows, Theme, LICHESS_DUMP_URL},
    logging, VERSION,
};

#[derive(Parser)]
#[command(name = "build-dataset", version = VERSION, about = "Build a mate-in-N puzzle dataset")]
struct Cli {
    /// The theme to select: `m1` for mate in 1, `m2` for mate in 2
    #[arg(long)]
    theme: Theme,

    /// Where to write the filtered dataset
    #[arg(long)]
    out: PathBuf,

    /// Where to download the compressed puzzle dump from
    #[arg(long, default_value = LICHESS_DUMP_URL)]
    url: String,

    /// Where to keep the intermediate files (defaults to the output's directory)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Skip malformed rows in the dump instead of stopping
    #[arg(long)]
    skip_malformed: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_console_logging();
    info!("matebook {VERSION}");

    let mut opts = BuildOptions::new(cli.theme, cli.out);
    opts.url = cli.url;
    if let Some(work_dir) = cli.work_dir {
        opts.work_dir = work_dir;
    }
    if cli.skip_malformed {
        opts.malformed = MalformedRows::Skip;
    }

    let summary = dataset::build(&opts)
        .with_context(|| format!("failed to build the {} dataset", opts.theme))?;
    info!(
        "wrote {} of {} puzzles to {} ({} malformed rows skipped)",
        summary.selected,
        summary.rows_read,
        opts.out.display(),
        summary.skipped
    );
    Ok(())
}
