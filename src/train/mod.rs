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

//! The reward-driven fine-tuning loop.
//!
//! Each step draws a batch of positions from the corpus, asks the [`Policy`] for a group of
//! completions per position, scores every completion with the reward function, and hands the
//! scored batch back to the policy for an optimization step.
//! Nothing is retried: any failure of the policy ends the run.
//!
//! A run is wrapped in a [`Session`], which owns the logging and metrics setup.
//! Call [`init`] to begin one and [`Session::finish`] to close it.

use std::{io, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    corpus::{CorpusError, PuzzleCorpus},
    logging,
    prompt::PromptBuilder,
    reward::{score_group, GroupScore},
};

pub mod checkpoint;
pub mod config;
pub mod metrics;
pub mod policy;

pub use checkpoint::{CheckpointConfig, Checkpointer};
pub use config::{ConfigError, TrainConfig};
pub use metrics::{JsonlMetrics, MetricsSink, StepMetrics};
pub use policy::{HttpPolicy, Policy, PolicyConfig, PolicyError};

#[derive(Debug, Error)]
/// The ways that a training run can fail.
pub enum TrainError {
    /// The policy could not produce completions, or produced the wrong number of them.
    #[error("generation failed on step {step}: {source}")]
    Generation {
        /// The step being run.
        step: u64,
        /// What went wrong.
        source: PolicyError,
    },
    /// The policy could not apply an optimization step.
    #[error("optimization failed on step {step}: {source}")]
    Optimization {
        /// The step being run.
        step: u64,
        /// What went wrong.
        source: PolicyError,
    },
    /// The policy could not save a checkpoint.
    #[error("failed to save checkpoint {}: {source}", path.display())]
    Checkpoint {
        /// The checkpoint directory.
        path: PathBuf,
        /// What went wrong.
        source: PolicyError,
    },
    /// Step metrics could not be recorded.
    #[error("failed to record metrics: {0}")]
    Metrics(#[source] io::Error),
    /// A local file or directory could not be created.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The dataset could not be loaded.
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// One step's batch of prompts, completions, and rewards, as handed to the optimizer.
pub struct Rollout {
    /// The 1-indexed step number.
    pub step: u64,
    /// The prompts of the batch.
    pub prompts: Vec<String>,
    /// The completions for each prompt, grouped in the same order as `prompts`.
    pub completions: Vec<Vec<String>>,
    /// The reward for each completion, grouped in the same way as `completions`.
    pub rewards: Vec<Vec<f32>>,
}

/// Check that a policy wrote exactly `group_size` completions for each of `n_prompts` prompts.
fn check_shape(
    completions: &[Vec<String>],
    n_prompts: usize,
    group_size: usize,
) -> Result<(), PolicyError> {
    if completions.len() == n_prompts && completions.iter().all(|g| g.len() == group_size) {
        return Ok(());
    }
    Err(PolicyError::Mismatch {
        expected: n_prompts * group_size,
        found: completions.iter().map(Vec::len).sum(),
    })
}

#[derive(Clone, Debug)]
/// The state of a training run between steps.
pub struct Trainer {
    corpus: PuzzleCorpus,
    prompts: PromptBuilder,
    batch_size: usize,
    group_size: usize,
    checkpointer: Checkpointer,
    /// The number of steps completed so far.
    steps_done: u64,
}

impl Trainer {
    #[must_use]
    /// Construct a trainer which draws positions from `corpus` and is otherwise set up by
    /// `config`.
    pub fn new(config: &TrainConfig, corpus: PuzzleCorpus) -> Trainer {
        Trainer {
            corpus,
            prompts: PromptBuilder::for_theme(config.theme),
            batch_size: config.batch_size,
            group_size: config.group_size,
            checkpointer: Checkpointer::new(
                config.checkpoint.dir.clone(),
                config.checkpoint_prefix(),
                config.checkpoint.every,
            ),
            steps_done: 0,
        }
    }

    #[must_use]
    /// Get the number of steps completed so far.
    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    /// Run one step, recording its metrics into `metrics` and checkpointing `policy` if one is
    /// due.
    ///
    /// # Errors
    ///
    /// This function will return an error if the policy fails at anything, or if the metrics or
    /// checkpoint cannot be written.
    /// A failed step does not count as completed.
    pub fn step<P: Policy + ?Sized, M: MetricsSink + ?Sized>(
        &mut self,
        policy: &mut P,
        metrics: &mut M,
    ) -> Result<StepMetrics, TrainError> {
        let step = self.steps_done + 1;
        let fens = self.corpus.next_batch(self.batch_size);
        let prompts = self.prompts.render_all(&fens);

        let completions = policy
            .generate(&prompts, self.group_size)
            .and_then(|completions| {
                check_shape(&completions, prompts.len(), self.group_size)?;
                Ok(completions)
            })
            .map_err(|source| TrainError::Generation { step, source })?;

        let scores: Vec<GroupScore> = fens
            .iter()
            .zip(&completions)
            .map(|(fen, group)| score_group(fen, group.as_slice()))
            .collect();
        let summary = StepMetrics::from_scores(step, &scores);

        let rollout = Rollout {
            step,
            prompts,
            completions,
            rewards: scores.into_iter().map(|s| s.rewards).collect(),
        };
        policy
            .step(&rollout)
            .map_err(|source| TrainError::Optimization { step, source })?;

        info!(
            step,
            mean_reward = summary.mean_reward,
            legal_rate = summary.legal_rate,
            mate_rate = summary.mate_rate,
            "step complete"
        );
        metrics.record(&summary).map_err(TrainError::Metrics)?;
        self.steps_done = step;

        if self.checkpointer.is_due(step) {
            self.checkpointer.save(policy, step)?;
        }
        Ok(summary)
    }

    /// Run `steps` steps in a row.
    /// Returns the metrics of the last step, if any were run.
    ///
    /// # Errors
    ///
    /// This function will return the first error encountered by [`Trainer::step`], after which no
    /// more steps are run.
    pub fn run<P: Policy + ?Sized, M: MetricsSink + ?Sized>(
        &mut self,
        policy: &mut P,
        metrics: &mut M,
        steps: u64,
    ) -> Result<Option<StepMetrics>, TrainError> {
        let mut last = None;
        for _ in 0..steps {
            last = Some(self.step(policy, metrics)?);
        }
        Ok(last)
    }
}

/// A training run in progress, owning its metrics output.
#[derive(Debug)]
pub struct Session {
    config: TrainConfig,
    metrics: Option<JsonlMetrics>,
}

/// Begin a training session.
/// This installs the console logger and opens the metrics file, if one is configured.
///
/// # Errors
///
/// This function will return an error if the configuration is invalid or the metrics file could
/// not be opened.
pub fn init(config: TrainConfig) -> Result<Session, TrainError> {
    logging::init_console_logging();
    config.validate()?;
    let metrics = match &config.metrics {
        Some(path) => Some(JsonlMetrics::open(path).map_err(|source| TrainError::Io {
            path: path.clone(),
            source,
        })?),
        None => None,
    };
    info!(
        "training on {} ({}) for {} steps: batch size {}, group size {}",
        config.data.display(),
        config.theme,
        config.steps,
        config.batch_size,
        config.group_size,
    );
    Ok(Session { config, metrics })
}

impl Session {
    #[must_use]
    /// Get the configuration of this session.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Load the dataset and train `policy` on it for the configured number of steps.
    /// Returns the metrics of the last step.
    ///
    /// # Errors
    ///
    /// This function will return an error if the dataset cannot be loaded or any step fails.
    pub fn run<P: Policy + ?Sized>(
        &mut self,
        policy: &mut P,
    ) -> Result<Option<StepMetrics>, TrainError> {
        let corpus = PuzzleCorpus::load(&self.config.data, self.config.seed)?;
        let mut trainer = Trainer::new(&self.config, corpus);
        trainer.run(policy, &mut self.metrics, self.config.steps)
    }

    /// End the session, flushing any buffered metrics.
    ///
    /// # Errors
    ///
    /// This function will return an error if the metrics could not be flushed.
    pub fn finish(mut self) -> Result<(), TrainError> {
        self.metrics.flush().map_err(TrainError::Metrics)?;
        info!("training session finished");
        Ok(())
    }
}
