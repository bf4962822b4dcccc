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

//! Periodic persistence of the policy's state.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::info;

use super::{policy::Policy, TrainError};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Where and how often checkpoints are written.
pub struct CheckpointConfig {
    /// The directory under which every checkpoint directory is placed.
    pub dir: PathBuf,
    /// The prefix of each checkpoint directory's name.
    /// If unset, it is derived from the puzzle theme.
    pub prefix: Option<String>,
    /// The number of steps between checkpoints. Zero turns checkpointing off.
    pub every: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            dir: PathBuf::from("ckpts"),
            prefix: None,
            every: 500,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Decides when to checkpoint, and where each checkpoint goes.
///
/// The checkpoint after step `N` lives in `{root}/{prefix}_step{N}`.
pub struct Checkpointer {
    root: PathBuf,
    prefix: String,
    every: u64,
}

impl Checkpointer {
    #[must_use]
    /// Construct a checkpointer which saves every `every` steps.
    /// If `every` is zero, it never saves.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>, every: u64) -> Checkpointer {
        Checkpointer {
            root: root.into(),
            prefix: prefix.into(),
            every,
        }
    }

    #[must_use]
    /// Get the directory under which checkpoints are placed.
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    /// Determine whether a checkpoint is due after the 1-indexed step `step`.
    pub fn is_due(&self, step: u64) -> bool {
        self.every != 0 && step % self.every == 0
    }

    #[must_use]
    /// Get the directory for the checkpoint taken after `step`.
    pub fn dir_for(&self, step: u64) -> PathBuf {
        self.root.join(format!("{}_step{step}", self.prefix))
    }

    /// Have `policy` save its state into the directory for `step`.
    /// The checkpoint root is created if needed, but the step directory itself is left to the
    /// policy.
    ///
    /// # Errors
    ///
    /// This function will return an error if the root could not be created or the policy failed
    /// to save.
    pub fn save<P: Policy + ?Sized>(&self, policy: &mut P, step: u64) -> Result<PathBuf, TrainError> {
        fs::create_dir_all(&self.root).map_err(|source| TrainError::Io {
            path: self.root.clone(),
            source,
        })?;
        let dir = self.dir_for(step);
        policy
            .save(&dir)
            .map_err(|source| TrainError::Checkpoint {
                path: dir.clone(),
                source,
            })?;
        info!("saved checkpoint {}", dir.display());
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Test the checkpoint cadence.
    fn cadence() {
        let ckpt = Checkpointer::new("ckpts", "mate1_grpo", 500);
        assert!(!ckpt.is_due(1));
        assert!(!ckpt.is_due(499));
        assert!(ckpt.is_due(500));
        assert!(!ckpt.is_due(501));
        assert!(ckpt.is_due(10_000));

        let never = Checkpointer::new("ckpts", "mate1_grpo", 0);
        assert!(!never.is_due(500));
    }

    #[test]
    /// Test that checkpoint directories are named by step.
    fn naming() {
        let ckpt = Checkpointer::new("ckpts", "mate1_grpo", 500);
        assert_eq!(
            ckpt.dir_for(1500),
            Path::new("ckpts").join("mate1_grpo_step1500")
        );
    }
}
