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

//! Selection of mate-in-N puzzles from the decompressed dump.
//!
//! The dump is a CSV file with one puzzle per row.
//! Only three of its columns matter here, and they are located by name:
//!
//! - `FEN`, the position the puzzle starts from,
//! - `Rating`, the puzzle's difficulty (which may be empty),
//! - `Themes`, a space-separated list of theme tags.
//!
//! A row is selected when its `Themes` field contains the target tag anywhere as a substring, so
//! `mateIn1` would also select a hypothetical `mateIn12`.
//! Selected rows are stably sorted by rating, with unrated rows last, and written out as a
//! two-column `FEN,Rating` file.

use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use csv::{ErrorKind, StringRecord};
use tracing::{info, warn};

use super::DatasetError;

/// The name of the column holding each puzzle's position.
pub const FEN_COLUMN: &str = "FEN";
/// The name of the column holding each puzzle's rating.
pub const RATING_COLUMN: &str = "Rating";
/// The name of the column holding each puzzle's themes.
pub const THEMES_COLUMN: &str = "Themes";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// The policy for rows of the dump which cannot be parsed.
///
/// A row is malformed if it lacks one of the required fields, has an empty FEN, or has a rating
/// which is present but not an integer.
/// An empty rating is not malformed: it is a puzzle without a rating.
pub enum MalformedRows {
    #[default]
    /// Stop at the first malformed row and report it.
    Abort,
    /// Drop malformed rows, counting them in the [`FilterSummary`].
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// One puzzle as read from the dump, restricted to the columns of interest.
pub struct PuzzleRecord {
    /// The starting position of the puzzle.
    pub fen: String,
    /// The puzzle's rating, if it has one.
    pub rating: Option<i32>,
    /// The space-separated theme tags of the puzzle.
    pub themes: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// One row of a filtered dataset.
pub struct FilteredPuzzle {
    /// The starting position of the puzzle.
    pub fen: String,
    /// The puzzle's rating, if it has one.
    pub rating: Option<i32>,
}

impl From<PuzzleRecord> for FilteredPuzzle {
    fn from(record: PuzzleRecord) -> Self {
        FilteredPuzzle {
            fen: record.fen,
            rating: record.rating,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Counts describing a completed filtering pass.
pub struct FilterSummary {
    /// The number of data rows read, including any skipped ones.
    pub rows_read: u64,
    /// The number of rows written to the output.
    pub selected: u64,
    /// The number of malformed rows which were dropped.
    pub skipped: u64,
}

/// The positions of the three interesting columns within each record.
struct Columns {
    fen: usize,
    rating: usize,
    themes: usize,
}

impl Columns {
    /// Locate the required columns in a header row.
    fn locate(headers: &StringRecord) -> Result<Columns, DatasetError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DatasetError::Parse {
                    line: 1,
                    reason: format!("missing required column `{name}`"),
                })
        };
        Ok(Columns {
            fen: find(FEN_COLUMN)?,
            rating: find(RATING_COLUMN)?,
            themes: find(THEMES_COLUMN)?,
        })
    }

    /// Extract a puzzle from a data row, or explain why that cannot be done.
    fn extract(&self, record: &StringRecord) -> Result<PuzzleRecord, String> {
        let field = |idx: usize, name: &str| {
            record
                .get(idx)
                .ok_or_else(|| format!("row has no `{name}` field"))
        };

        let fen = field(self.fen, FEN_COLUMN)?;
        if fen.is_empty() {
            return Err("empty FEN".into());
        }
        let rating = match field(self.rating, RATING_COLUMN)?.trim() {
            "" => None,
            s => Some(
                s.parse::<i32>()
                    .map_err(|e| format!("invalid rating `{s}`: {e}"))?,
            ),
        };
        let themes = field(self.themes, THEMES_COLUMN)?;

        Ok(PuzzleRecord {
            fen: fen.to_string(),
            rating,
            themes: themes.to_string(),
        })
    }
}

/// Read a puzzle dump from `reader`, returning the rows whose themes contain `tag`, sorted by
/// rating.
///
/// # Errors
///
/// This function will return an error if the header lacks a required column, if reading fails,
/// or if a malformed row is found under [`MalformedRows::Abort`].
pub fn select<R: Read>(
    reader: R,
    tag: &str,
    policy: MalformedRows,
) -> Result<(Vec<FilteredPuzzle>, FilterSummary), DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = Columns::locate(csv_reader.headers().map_err(header_error)?)?;

    let mut summary = FilterSummary::default();
    let mut selected = Vec::new();
    for result in csv_reader.records() {
        summary.rows_read += 1;
        let parsed = match result {
            Ok(record) => {
                let line = record.position().map_or(0, csv::Position::line);
                columns
                    .extract(&record)
                    .map_err(|reason| DatasetError::Parse { line, reason })
            }
            Err(e) => Err(row_error(e)?),
        };
        match parsed {
            Ok(puzzle) => {
                if puzzle.themes.contains(tag) {
                    selected.push(FilteredPuzzle::from(puzzle));
                }
            }
            Err(e) => match policy {
                MalformedRows::Abort => return Err(e),
                MalformedRows::Skip => {
                    warn!("skipping malformed row: {e}");
                    summary.skipped += 1;
                }
            },
        }
    }

    // stable: equal ratings keep their order from the dump
    selected.sort_by_key(|p| (p.rating.is_none(), p.rating));
    summary.selected = selected.len() as u64;
    Ok((selected, summary))
}

/// Convert an error reading the header row into a dataset error.
fn header_error(e: csv::Error) -> DatasetError {
    match e.into_kind() {
        ErrorKind::Io(source) => DatasetError::Io {
            path: "<header>".into(),
            source,
        },
        kind => DatasetError::Parse {
            line: 1,
            reason: format!("unreadable header: {kind:?}"),
        },
    }
}

/// Classify an error reading a data row.
/// I/O failures are always fatal, so they are returned in the outer `Err`; anything else is a
/// malformed row and is subject to the [`MalformedRows`] policy.
fn row_error(e: csv::Error) -> Result<DatasetError, DatasetError> {
    let line = e.position().map_or(0, csv::Position::line);
    match e.into_kind() {
        ErrorKind::Io(source) => Err(DatasetError::Io {
            path: format!("<row {line}>").into(),
            source,
        }),
        kind => Ok(DatasetError::Parse {
            line,
            reason: format!("unreadable row: {kind:?}"),
        }),
    }
}

/// Write a filtered dataset as CSV to `writer`: a `FEN,Rating` header followed by one row per
/// puzzle.
/// Unrated puzzles have an empty `Rating` field.
///
/// # Errors
///
/// This function will return an error if writing fails.
pub fn write_filtered<W: Write>(writer: W, puzzles: &[FilteredPuzzle]) -> io::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([FEN_COLUMN, RATING_COLUMN])?;
    for puzzle in puzzles {
        let rating = puzzle.rating.map(|r| r.to_string()).unwrap_or_default();
        csv_writer.write_record([puzzle.fen.as_str(), rating.as_str()])?;
    }
    csv_writer.flush()
}

/// Filter the dump at `src` down to the puzzles tagged with `tag`, writing the sorted result to
/// `out`.
///
/// # Errors
///
/// This function will return an error if `src` cannot be read or parsed (subject to `policy`),
/// or if `out` cannot be written.
/// Nothing is written to `out` unless filtering succeeds.
pub fn filter_puzzles(
    src: &Path,
    tag: &str,
    out: &Path,
    policy: MalformedRows,
) -> Result<FilterSummary, DatasetError> {
    info!("loading {}", src.display());
    let input = File::open(src).map_err(DatasetError::io(src))?;
    let (puzzles, summary) = select(input, tag, policy).map_err(|e| match e {
        // attach the real path to I/O failures surfaced by the CSV reader
        DatasetError::Io { source, .. } => DatasetError::io(src)(source),
        e => e,
    })?;
    info!("found {} {tag} puzzles", summary.selected);
    if summary.skipped > 0 {
        warn!("skipped {} malformed rows", summary.skipped);
    }

    let output = File::create(out).map_err(DatasetError::io(out))?;
    write_filtered(output, &puzzles).map_err(DatasetError::io(out))?;
    info!("wrote {}", out.display());
    Ok(summary)
}
