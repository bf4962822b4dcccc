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

//! Configuration of a training run, loadable from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::dataset::Theme;

use super::{checkpoint::CheckpointConfig, policy::PolicyConfig};

#[derive(Debug, Error)]
/// The ways that loading a training configuration can fail.
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    FileRead {
        /// The configuration file's path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML, or has fields of the wrong type or name.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// A setting has a value which no run could use.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Everything needed to run a training loop.
pub struct TrainConfig {
    /// The filtered dataset from which positions are drawn.
    pub data: PathBuf,
    /// The theme of the puzzles in the dataset, which sets the depth asked for in prompts.
    pub theme: Theme,
    /// A seed for the order of positions. If unset, every run draws a different order.
    pub seed: Option<u64>,
    /// The number of optimization steps to run.
    pub steps: u64,
    /// The number of positions drawn per step.
    pub batch_size: usize,
    /// The number of completions requested per prompt.
    pub group_size: usize,
    /// An NDJSON file to which per-step metrics are appended.
    pub metrics: Option<PathBuf>,
    /// Where and how often checkpoints are written, from the `[checkpoint]` table.
    pub checkpoint: CheckpointConfig,
    /// The model-serving process and its hyperparameters, from the `[policy]` table.
    pub policy: PolicyConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            data: PathBuf::from("data/mate_in_1.csv"),
            theme: Theme::MateIn1,
            seed: None,
            steps: 10_000,
            batch_size: 64,
            group_size: 8,
            metrics: None,
            checkpoint: CheckpointConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Load a configuration from a TOML file.
    /// Any field which the file leaves out takes its default value.
    ///
    /// # Errors
    ///
    /// This function will return an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid.
    pub fn load(path: &Path) -> Result<TrainConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TrainConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a run which can actually be performed.
    ///
    /// # Errors
    ///
    /// This function will return [`ConfigError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::Validation("steps must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size must be > 0".into()));
        }
        if self.group_size == 0 {
            return Err(ConfigError::Validation("group_size must be > 0".into()));
        }
        if self.checkpoint.prefix.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Validation(
                "checkpoint.prefix must not be empty".into(),
            ));
        }
        if self.policy.endpoint.is_empty() {
            return Err(ConfigError::Validation("policy.endpoint must be set".into()));
        }
        if self.policy.model.is_empty() {
            return Err(ConfigError::Validation("policy.model must be set".into()));
        }
        if self.policy.lora_r == 0 {
            return Err(ConfigError::Validation("policy.lora_r must be > 0".into()));
        }
        if self.policy.lora_alpha == 0 {
            return Err(ConfigError::Validation(
                "policy.lora_alpha must be > 0".into(),
            ));
        }
        if self.policy.learning_rate.is_nan() || self.policy.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "policy.learning_rate must be > 0".into(),
            ));
        }
        if self.policy.max_new_tokens == 0 {
            return Err(ConfigError::Validation(
                "policy.max_new_tokens must be > 0".into(),
            ));
        }
        if self.policy.accumulate_steps == 0 {
            return Err(ConfigError::Validation(
                "policy.accumulate_steps must be > 0".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    /// Get the prefix of checkpoint directory names, derived from the theme if not configured.
    pub fn checkpoint_prefix(&self) -> String {
        self.checkpoint
            .prefix
            .clone()
            .unwrap_or_else(|| format!("mate{}_grpo", self.theme.depth()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    /// Test that the defaults describe a valid run.
    fn defaults_are_valid() {
        let config = TrainConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.group_size, 8);
        assert_eq!(config.checkpoint.every, 500);
        assert_eq!(config.checkpoint_prefix(), "mate1_grpo");
    }

    #[test]
    /// Test that a partial file is filled in with defaults.
    fn partial_file() {
        let config: TrainConfig = toml::from_str(
            r#"
            data = "puzzles/m2.csv"
            theme = "m2"
            seed = 17
            steps = 20

            [checkpoint]
            dir = "runs"

            [policy]
            endpoint = "http://localhost:9000"
            learning_rate = 1e-4
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.data, PathBuf::from("puzzles/m2.csv"));
        assert_eq!(config.theme, Theme::MateIn2);
        assert_eq!(config.seed, Some(17));
        assert_eq!(config.steps, 20);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.checkpoint.dir, PathBuf::from("runs"));
        assert_eq!(config.checkpoint.every, 500);
        assert_eq!(config.checkpoint_prefix(), "mate2_grpo");
        assert_eq!(config.policy.endpoint, "http://localhost:9000");
        assert_eq!(config.policy.max_new_tokens, 4);
        assert_eq!(config.policy.model, "Qwen/Qwen2.5-3B-Instruct");
        assert_eq!(config.policy.lora_r, 16);
        assert_eq!(config.policy.lora_alpha, 32);
    }

    #[test]
    /// Test that checkpointing can be switched off with a zero interval.
    fn checkpoints_disabled() {
        let config: TrainConfig = toml::from_str("[checkpoint]\nevery = 0").unwrap();
        config.validate().unwrap();
        assert_eq!(config.checkpoint.every, 0);
    }

    #[test]
    /// Test that themes can be written as either codes or tags.
    fn theme_spellings() {
        let tag: TrainConfig = toml::from_str("theme = \"mateIn2\"").unwrap();
        assert_eq!(tag.theme, Theme::MateIn2);
        assert!(toml::from_str::<TrainConfig>("theme = \"mateIn3\"").is_err());
    }

    #[test]
    /// Test that misspelled fields are rejected rather than silently ignored.
    fn unknown_field() {
        assert!(toml::from_str::<TrainConfig>("batchsize = 4").is_err());
    }

    #[test]
    /// Test that nonsensical values are caught by validation.
    fn validation() {
        let cases = [
            "steps = 0",
            "batch_size = 0",
            "group_size = 0",
            "[checkpoint]\nprefix = \"\"",
            "[policy]\nendpoint = \"\"",
            "[policy]\nlearning_rate = 0.0",
            "[policy]\nlearning_rate = nan",
            "[policy]\nmax_new_tokens = 0",
            "[policy]\nmodel = \"\"",
            "[policy]\nlora_r = 0",
            "[policy]\nlora_alpha = 0",
        ];
        for case in cases {
            let config: TrainConfig = toml::from_str(case).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "accepted `{case}`"
            );
        }
    }

    #[test]
    /// Test loading from a file, including the failure modes.
    fn load_file() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("train.toml");
        fs::write(&good, "steps = 3\nbatch_size = 2\n").unwrap();
        let config = TrainConfig::load(&good).unwrap();
        assert_eq!(config.steps, 3);
        assert_eq!(config.batch_size, 2);

        let invalid = dir.path().join("invalid.toml");
        fs::write(&invalid, "group_size = 0\n").unwrap();
        assert!(matches!(
            TrainConfig::load(&invalid),
            Err(ConfigError::Validation(_))
        ));

        let garbled = dir.path().join("garbled.toml");
        fs::write(&garbled, "steps = [\n").unwrap();
        assert!(matches!(
            TrainConfig::load(&garbled),
            Err(ConfigError::TomlParse(_))
        ));

        assert!(matches!(
            TrainConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::FileRead { .. })
        ));
    }
}
