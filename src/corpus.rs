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

//! The stream of puzzle positions consumed by training.
//!
//! Positions are drawn epoch by epoch: the whole corpus is shuffled, every position is handed out
//! exactly once, and then the corpus is reshuffled for the next epoch.
//! This is not sampling with replacement, so no position is seen twice before every other
//! position has been seen once.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use fastrand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::dataset::filter::FEN_COLUMN;

/// An endless iterator over a fixed collection, reshuffled at the start of every epoch.
///
/// The state is exactly the items, a cursor into them, and the random number generator used for
/// shuffling.
/// When the cursor reaches the end of the items, the items are shuffled in place and the cursor
/// wraps around.
#[derive(Clone, Debug)]
pub struct EpochShuffler<T> {
    /// The items, in the order of the current epoch.
    items: Vec<T>,
    /// The index of the next item to hand out.
    cursor: usize,
    /// The number of epochs started so far.
    epoch: u64,
    /// The source of randomness for shuffling.
    rng: Rng,
}

impl<T> EpochShuffler<T> {
    #[must_use]
    /// Construct a shuffler over `items` with an arbitrary seed.
    pub fn new(items: Vec<T>) -> EpochShuffler<T> {
        EpochShuffler::with_rng(items, Rng::new())
    }

    #[must_use]
    /// Construct a shuffler over `items` whose order is determined entirely by `seed`.
    pub fn with_seed(items: Vec<T>, seed: u64) -> EpochShuffler<T> {
        EpochShuffler::with_rng(items, Rng::with_seed(seed))
    }

    fn with_rng(items: Vec<T>, rng: Rng) -> EpochShuffler<T> {
        EpochShuffler {
            // start at the end, so that the first draw shuffles
            cursor: items.len(),
            items,
            epoch: 0,
            rng,
        }
    }

    #[must_use]
    /// Get the number of items in one epoch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    /// Determine whether there are no items at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    /// Get the number of epochs started so far.
    /// This is zero until the first item is drawn.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl<T: Clone> Iterator for EpochShuffler<T> {
    type Item = T;

    /// Draw the next item.
    /// This only returns `None` if there are no items at all.
    fn next(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        if self.cursor == self.items.len() {
            self.rng.shuffle(&mut self.items);
            self.cursor = 0;
            self.epoch += 1;
        }
        let item = self.items[self.cursor].clone();
        self.cursor += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.items.is_empty() {
            (0, Some(0))
        } else {
            (usize::MAX, None)
        }
    }
}

#[derive(Debug, Error)]
/// The ways that loading a puzzle corpus can fail.
pub enum CorpusError {
    /// The dataset could not be opened.
    #[error("could not open {}: {source}", path.display())]
    Open {
        /// The dataset's path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The dataset could not be read as CSV with a `FEN` column.
    #[error("could not read {}: {source}", path.display())]
    Read {
        /// The dataset's path.
        path: PathBuf,
        /// The underlying error.
        source: csv::Error,
    },
    /// The dataset has no `FEN` column.
    #[error("{} has no `FEN` column", path.display())]
    MissingColumn {
        /// The dataset's path.
        path: PathBuf,
    },
    /// The dataset has no positions in it.
    #[error("{} contains no positions", path.display())]
    Empty {
        /// The dataset's path.
        path: PathBuf,
    },
}

/// The only part of a dataset row that training needs.
#[derive(Deserialize)]
struct FenRow {
    #[serde(rename = "FEN")]
    fen: String,
}

/// An endless, epoch-shuffled supply of puzzle positions.
#[derive(Clone, Debug)]
pub struct PuzzleCorpus {
    fens: EpochShuffler<String>,
}

impl PuzzleCorpus {
    /// Load the `FEN` column of a filtered dataset.
    /// If `seed` is given, the order in which positions are drawn is reproducible.
    ///
    /// # Errors
    ///
    /// This function will return an error if the dataset cannot be read, has no `FEN` column, or
    /// is empty.
    pub fn load(path: &Path, seed: Option<u64>) -> Result<PuzzleCorpus, CorpusError> {
        let read_err = |source| CorpusError::Read {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|source| CorpusError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(file);
        if !reader.headers().map_err(read_err)?.iter().any(|h| h == FEN_COLUMN) {
            return Err(CorpusError::MissingColumn {
                path: path.to_path_buf(),
            });
        }
        let fens = reader
            .deserialize::<FenRow>()
            .map(|row| row.map(|r| r.fen))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err)?;
        if fens.is_empty() {
            return Err(CorpusError::Empty {
                path: path.to_path_buf(),
            });
        }

        info!("loaded {} positions from {}", fens.len(), path.display());
        Ok(PuzzleCorpus::from_fens(fens, seed))
    }

    #[must_use]
    /// Construct a corpus from positions already in memory.
    pub fn from_fens(fens: Vec<String>, seed: Option<u64>) -> PuzzleCorpus {
        let fens = match seed {
            Some(seed) => EpochShuffler::with_seed(fens, seed),
            None => EpochShuffler::new(fens),
        };
        PuzzleCorpus { fens }
    }

    #[must_use]
    /// Get the number of distinct positions in the corpus.
    pub fn len(&self) -> usize {
        self.fens.len()
    }

    #[must_use]
    /// Determine whether the corpus has no positions.
    pub fn is_empty(&self) -> bool {
        self.fens.is_empty()
    }

    #[must_use]
    /// Get the number of epochs started so far.
    pub fn epoch(&self) -> u64 {
        self.fens.epoch()
    }

    /// Draw the next `n` positions.
    /// Batches may straddle an epoch boundary.
    pub fn next_batch(&mut self, n: usize) -> Vec<String> {
        self.fens.by_ref().take(n).collect()
    }
}
