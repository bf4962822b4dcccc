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

//! Per-step training metrics, and the places they are recorded.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::reward::GroupScore;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
/// A summary of how well the policy did on one step's batch.
pub struct StepMetrics {
    /// The 1-indexed step number.
    pub step: u64,
    /// The mean reward over every completion in the batch.
    pub mean_reward: f32,
    /// The fraction of completions which began with a legal move.
    pub legal_rate: f32,
    /// The fraction of completions which delivered checkmate.
    pub mate_rate: f32,
}

impl StepMetrics {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    /// Summarize the scores of every group in a batch.
    /// An empty batch has all rates zero.
    pub fn from_scores(step: u64, scores: &[GroupScore]) -> StepMetrics {
        let total: usize = scores.iter().map(|s| s.rewards.len()).sum();
        if total == 0 {
            return StepMetrics {
                step,
                mean_reward: 0.0,
                legal_rate: 0.0,
                mate_rate: 0.0,
            };
        }
        let n = total as f32;
        let reward_sum: f32 = scores.iter().flat_map(|s| &s.rewards).sum();
        let legal: usize = scores.iter().map(|s| s.legal).sum();
        let mates: usize = scores.iter().map(|s| s.mates).sum();
        StepMetrics {
            step,
            mean_reward: reward_sum / n,
            legal_rate: legal as f32 / n,
            mate_rate: mates as f32 / n,
        }
    }
}

/// A destination for per-step metrics.
pub trait MetricsSink {
    /// Record the metrics of one step.
    ///
    /// # Errors
    ///
    /// This function will return an error if the metrics could not be written.
    fn record(&mut self, metrics: &StepMetrics) -> io::Result<()>;

    /// Make sure everything recorded so far has reached its destination.
    ///
    /// # Errors
    ///
    /// This function will return an error if buffered metrics could not be written.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps every step's metrics in memory.
impl MetricsSink for Vec<StepMetrics> {
    fn record(&mut self, metrics: &StepMetrics) -> io::Result<()> {
        self.push(*metrics);
        Ok(())
    }
}

/// Records nothing when absent.
impl<M: MetricsSink> MetricsSink for Option<M> {
    fn record(&mut self, metrics: &StepMetrics) -> io::Result<()> {
        match self {
            Some(sink) => sink.record(metrics),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

/// An append-only file of metrics, one JSON object per line.
#[derive(Debug)]
pub struct JsonlMetrics {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlMetrics {
    /// Open `path` for appending, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// This function will return an error if the file could not be opened.
    pub fn open(path: &Path) -> io::Result<JsonlMetrics> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlMetrics {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    /// Get the path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonlMetrics {
    fn record(&mut self, metrics: &StepMetrics) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, metrics)?;
        self.writer.write_all(b"\n")?;
        // flushed per step
        self.writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
