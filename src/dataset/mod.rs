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

//! Construction of mate-in-N puzzle datasets from the Lichess puzzle dump.
//!
//! Building a dataset is a straight line: [`download`] the compressed dump, [`decompress`] it
//! next to the output, [`filter`] it down to the puzzles of one theme, and then [`cleanup`] the
//! intermediate files.
//! Any failure along the way stops the build.
//! Intermediates are only removed once the filtered dataset has been written, so a failed build
//! leaves them on disk for inspection.

use std::{
    fmt::{Display, Formatter},
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub mod cleanup;
pub mod decompress;
pub mod download;
pub mod filter;
mod progress;

pub use cleanup::remove_if_present;
pub use decompress::decompress;
pub use download::download;
pub use filter::{filter_puzzles, FilterSummary, MalformedRows};

/// The location of the full Lichess puzzle database.
pub const LICHESS_DUMP_URL: &str = "https://database.lichess.org/lichess_db_puzzle.csv.zst";

/// The size of each chunk read while downloading or decompressing: one mebibyte.
pub const CHUNK_SIZE: usize = 1 << 20;

/// The file name of the downloaded, still-compressed dump.
pub const RAW_ARCHIVE_NAME: &str = "lichess_db_puzzle.csv.zst";

/// The file name of the decompressed dump.
pub const RAW_CSV_NAME: &str = "lichess_puzzles_raw.csv";

#[derive(Debug, Error)]
/// The ways that building a dataset can fail.
pub enum DatasetError {
    /// The dump could not be fetched, either because the connection failed or because the server
    /// answered with a non-success status.
    #[error("failed to download {url}: {reason}")]
    Transfer {
        /// The URL being fetched.
        url: String,
        /// A description of what went wrong.
        reason: String,
    },
    /// The compressed input was corrupt or truncated.
    #[error("failed to decompress {}: {source}", path.display())]
    Decompression {
        /// The compressed file being read.
        path: PathBuf,
        /// The underlying decoder error.
        source: io::Error,
    },
    /// The tabular file was missing a required column or contained a malformed row.
    #[error("parse error on line {line}: {reason}")]
    Parse {
        /// The 1-indexed line of the file on which the problem was found.
        line: u64,
        /// A description of the problem.
        reason: String,
    },
    /// The output path is also the path of an intermediate file, which would be removed once
    /// the build finished.
    #[error("output {} collides with an intermediate file", path.display())]
    OutputCollision {
        /// The output path.
        path: PathBuf,
    },
    /// A local file could not be created, read, written, or removed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

impl DatasetError {
    /// Helper for wrapping an I/O error with the path it concerns.
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> DatasetError + '_ {
        move |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A puzzle theme which a dataset can be built from.
pub enum Theme {
    /// Puzzles solved by a single checkmating move.
    #[serde(alias = "m1")]
    MateIn1,
    /// Puzzles solved by forcing checkmate in two moves.
    #[serde(alias = "m2")]
    MateIn2,
}

impl Theme {
    /// Every theme, in order of depth.
    pub const ALL: [Theme; 2] = [Theme::MateIn1, Theme::MateIn2];

    #[must_use]
    /// Get the tag which Lichess uses to mark puzzles of this theme.
    pub const fn tag(self) -> &'static str {
        match self {
            Theme::MateIn1 => "mateIn1",
            Theme::MateIn2 => "mateIn2",
        }
    }

    #[must_use]
    /// Get the number of moves in which the solver must deliver mate.
    pub const fn depth(self) -> u8 {
        match self {
            Theme::MateIn1 => 1,
            Theme::MateIn2 => 2,
        }
    }

    #[must_use]
    /// Get the short code used to select this theme on the command line.
    pub const fn code(self) -> &'static str {
        match self {
            Theme::MateIn1 => "m1",
            Theme::MateIn2 => "m2",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    /// Parse a theme from either its short code (`m1`) or its Lichess tag (`mateIn1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|theme| s == theme.code() || s == theme.tag())
            .ok_or_else(|| format!("unknown theme `{s}` (expected `m1` or `m2`)"))
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Everything needed to build one dataset.
pub struct BuildOptions {
    /// Where to fetch the compressed dump from.
    pub url: String,
    /// The theme which selected puzzles must carry.
    pub theme: Theme,
    /// The destination of the filtered dataset.
    pub out: PathBuf,
    /// The directory in which the intermediate files are placed.
    pub work_dir: PathBuf,
    /// What to do about malformed rows in the dump.
    pub malformed: MalformedRows,
}

impl BuildOptions {
    #[must_use]
    /// Construct options for building a dataset of `theme` puzzles at `out`, fetching the official
    /// dump and keeping the intermediates alongside the output.
    pub fn new(theme: Theme, out: impl Into<PathBuf>) -> BuildOptions {
        let out = out.into();
        let work_dir = match out.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        BuildOptions {
            url: LICHESS_DUMP_URL.to_string(),
            theme,
            out,
            work_dir,
            malformed: MalformedRows::default(),
        }
    }

    #[must_use]
    /// Get the path to which the compressed dump is downloaded.
    pub fn raw_archive(&self) -> PathBuf {
        self.work_dir.join(RAW_ARCHIVE_NAME)
    }

    #[must_use]
    /// Get the path to which the dump is decompressed.
    pub fn raw_csv(&self) -> PathBuf {
        self.work_dir.join(RAW_CSV_NAME)
    }
}

/// Build a dataset: download, decompress, filter, and clean up.
///
/// # Errors
///
/// This function will return an error if any stage of the pipeline fails.
/// In that case, any intermediate files already produced are left on disk.
pub fn build(opts: &BuildOptions) -> Result<FilterSummary, DatasetError> {
    build_with(&download::client()?, opts)
}

/// Determine whether two file paths name the same location, resolving their directories.
/// Paths whose directories do not exist are compared as written.
fn same_location(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| {
        let dir = match p.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Some(dir.canonicalize().ok()?.join(p.file_name()?))
    };
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Build a dataset, using `client` for the download.
///
/// # Errors
///
/// This function will return an error if the output would be overwritten by or removed with an
/// intermediate file, or if any stage of the pipeline fails.
pub fn build_with(
    client: &reqwest::blocking::Client,
    opts: &BuildOptions,
) -> Result<FilterSummary, DatasetError> {
    let archive = opts.raw_archive();
    let raw_csv = opts.raw_csv();

    std::fs::create_dir_all(&opts.work_dir).map_err(DatasetError::io(&opts.work_dir))?;
    if same_location(&opts.out, &archive) || same_location(&opts.out, &raw_csv) {
        return Err(DatasetError::OutputCollision {
            path: opts.out.clone(),
        });
    }
    download::download_with(client, &opts.url, &archive)?;
    decompress(&archive, &raw_csv)?;
    let summary = filter_puzzles(&raw_csv, opts.theme.tag(), &opts.out, opts.malformed)?;

    remove_if_present(&archive)?;
    remove_if_present(&raw_csv)?;

    info!("dataset complete: {}", opts.out.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_server;

    #[test]
    /// Test that themes can be parsed from both their short codes and their tags.
    fn parse_theme() {
        assert_eq!("m1".parse(), Ok(Theme::MateIn1));
        assert_eq!("m2".parse(), Ok(Theme::MateIn2));
        assert_eq!("mateIn2".parse(), Ok(Theme::MateIn2));
        assert!("m3".parse::<Theme>().is_err());
    }

    #[test]
    /// Test that the intermediates live next to the output by default.
    fn default_work_dir() {
        let opts = BuildOptions::new(Theme::MateIn1, "data/mate_in_1.csv");
        assert_eq!(opts.work_dir, PathBuf::from("data"));
        assert_eq!(opts.raw_archive(), PathBuf::from("data").join(RAW_ARCHIVE_NAME));

        let bare = BuildOptions::new(Theme::MateIn1, "mate_in_1.csv");
        assert_eq!(bare.work_dir, PathBuf::from("."));
    }

    /// Compress a CSV dump the way Lichess distributes it.
    fn compressed_dump(csv: &str) -> Vec<u8> {
        zstd::encode_all(csv.as_bytes(), 3).unwrap()
    }

    const DUMP: &str = "\
PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,Themes,GameUrl,OpeningTags
a,fen-a,e2e4,1500,75,90,100,mateIn2 middlegame,https://lichess.org/a,
b,fen-b,e2e4,900,75,90,100,mateIn1 short,https://lichess.org/b,
c,fen-c,e2e4,1200,75,90,100,mateIn2 long,https://lichess.org/c,
d,fen-d,e2e4,800,75,90,100,fork,https://lichess.org/d,
";

    #[test]
    /// Test that a full build produces the filtered dataset and removes the intermediates.
    fn build_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let url = test_server::serve_once("200 OK", compressed_dump(DUMP));
        let mut opts = BuildOptions::new(Theme::MateIn2, dir.path().join("mate_in_2.csv"));
        opts.url = url;

        let summary = build_with(&test_server::client(), &opts).unwrap();
        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.selected, 2);

        let written = fs::read_to_string(&opts.out).unwrap();
        assert_eq!(written, "FEN,Rating\nfen-c,1200\nfen-a,1500\n");
        assert!(!opts.raw_archive().exists());
        assert!(!opts.raw_csv().exists());
    }

    #[test]
    /// Test that a failed filter leaves the intermediate files in place.
    fn failed_build_keeps_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let url = test_server::serve_once("200 OK", compressed_dump("PuzzleId,FEN\na,fen-a\n"));
        let mut opts = BuildOptions::new(Theme::MateIn1, dir.path().join("mate_in_1.csv"));
        opts.url = url;

        let result = build_with(&test_server::client(), &opts);
        assert!(matches!(result, Err(DatasetError::Parse { line: 1, .. })));
        assert!(opts.raw_archive().exists());
        assert!(opts.raw_csv().exists());
        assert!(!opts.out.exists());
    }

    #[test]
    /// Test that an output which would be cleaned up as an intermediate is refused before
    /// anything is downloaded.
    fn output_collides_with_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for out in [
            dir.path().join(RAW_CSV_NAME),
            dir.path().join(RAW_ARCHIVE_NAME),
            // the same file, reached through another directory
            dir.path().join("sub").join("..").join(RAW_CSV_NAME),
        ] {
            let mut opts = BuildOptions::new(Theme::MateIn1, out);
            opts.work_dir = dir.path().to_path_buf();
            // never contacted
            opts.url = "http://127.0.0.1:9/lichess_db_puzzle.csv.zst".into();

            let result = build_with(&test_server::client(), &opts);
            assert!(
                matches!(result, Err(DatasetError::OutputCollision { .. })),
                "{}",
                opts.out.display()
            );
            assert!(!opts.out.exists());
        }
    }

    #[test]
    /// Test that a failed download stops the build before anything else happens.
    fn failed_download_stops_build() {
        let dir = tempfile::tempdir().unwrap();
        let url = test_server::serve_once("404 Not Found", b"no such file".to_vec());
        let mut opts = BuildOptions::new(Theme::MateIn1, dir.path().join("mate_in_1.csv"));
        opts.url = url;

        let result = build_with(&test_server::client(), &opts);
        assert!(matches!(result, Err(DatasetError::Transfer { .. })));
        assert!(!opts.raw_csv().exists());
        assert!(!opts.raw_archive().exists());
        assert!(!opts.out.exists());
    }
}
