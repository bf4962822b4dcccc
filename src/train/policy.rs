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

//! The model being trained, seen from the outside.
//!
//! Generation and optimization both happen in a separate model-serving process.
//! This module only defines the interface the training loop needs from it, and a client which
//! speaks that interface over JSON and HTTP.

use std::{path::Path, time::Duration};

use reqwest::blocking::Client;
use serde::{
    de::{DeserializeOwned, IgnoredAny},
    Deserialize, Serialize,
};
use thiserror::Error;
use tracing::debug;

use super::Rollout;

#[derive(Debug, Error)]
/// The ways that a policy can fail to do what was asked of it.
pub enum PolicyError {
    /// The request could not be sent, or the response could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The URL being requested.
        url: String,
        /// The underlying client error.
        source: reqwest::Error,
    },
    /// The serving process answered with a non-success status.
    #[error("{url} answered {status}: {body}")]
    Status {
        /// The URL being requested.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The body of the response, which usually explains the failure.
        body: String,
    },
    /// The policy produced a different number of completions than were asked for.
    #[error("expected {expected} completions, got {found}")]
    Mismatch {
        /// The number of completions asked for.
        expected: usize,
        /// The number of completions produced.
        found: usize,
    },
}

/// A trainable model which writes completions for prompts and learns from their rewards.
pub trait Policy {
    /// Produce `group_size` completions for each prompt.
    /// The outer vector has one entry per prompt, in the same order as `prompts`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the model could not generate.
    fn generate(
        &mut self,
        prompts: &[String],
        group_size: usize,
    ) -> Result<Vec<Vec<String>>, PolicyError>;

    /// Perform one optimization step on a scored batch.
    ///
    /// # Errors
    ///
    /// This function will return an error if the update could not be applied.
    fn step(&mut self, rollout: &Rollout) -> Result<(), PolicyError>;

    /// Persist the model's current state into `dir`.
    /// The contents of the directory belong entirely to the model.
    ///
    /// # Errors
    ///
    /// This function will return an error if the state could not be saved.
    fn save(&mut self, dir: &Path) -> Result<(), PolicyError>;
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Settings for the model-serving process.
pub struct PolicyConfig {
    /// The base URL of the serving process.
    pub endpoint: String,
    /// The identifier of the pretrained model being fine-tuned.
    pub model: String,
    /// The rank of the low-rank adapters trained on top of the model.
    pub lora_r: u32,
    /// The scaling factor of the low-rank adapters.
    pub lora_alpha: u32,
    /// The most tokens the model may write per completion.
    pub max_new_tokens: u32,
    /// The optimizer's learning rate.
    pub learning_rate: f64,
    /// The number of steps over which gradients are accumulated before the weights change.
    pub accumulate_steps: u32,
    /// How long to wait on any one request. If unset, requests never time out.
    pub timeout_secs: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            endpoint: "http://127.0.0.1:8000".into(),
            model: "Qwen/Qwen2.5-3B-Instruct".into(),
            lora_r: 16,
            lora_alpha: 32,
            max_new_tokens: 4,
            learning_rate: 2e-5,
            accumulate_steps: 4,
            timeout_secs: None,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompts: &'a [String],
    group_size: usize,
    max_new_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    completions: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct StepRequest<'a> {
    #[serde(flatten)]
    rollout: &'a Rollout,
    model: &'a str,
    lora_r: u32,
    lora_alpha: u32,
    learning_rate: f64,
    accumulate_steps: u32,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    dir: &'a Path,
}

/// A policy served by another process, reached over HTTP.
///
/// Every operation is a `POST` of a JSON body to a route under the endpoint: `/generate`,
/// `/step`, and `/save`.
/// Generation and optimization requests name the model, and optimization requests also carry
/// the adapter and optimizer settings.
/// A `/generate` response carries the completions as `{"completions": [[...], ...]}`; the
/// bodies of the other responses are ignored.
#[derive(Clone, Debug)]
pub struct HttpPolicy {
    /// The base URL, without a trailing slash.
    endpoint: String,
    client: Client,
    model: String,
    lora_r: u32,
    lora_alpha: u32,
    max_new_tokens: u32,
    learning_rate: f64,
    accumulate_steps: u32,
}

impl HttpPolicy {
    /// Construct a client for the serving process described by `config`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the HTTP client could not be constructed.
    pub fn new(config: &PolicyConfig) -> Result<HttpPolicy, PolicyError> {
        let client = Client::builder()
            .user_agent(concat!("matebook/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|source| PolicyError::Transport {
                url: config.endpoint.clone(),
                source,
            })?;
        Ok(HttpPolicy::with_client(client, config))
    }

    #[must_use]
    /// Construct a policy which makes its requests through `client`.
    pub fn with_client(client: Client, config: &PolicyConfig) -> HttpPolicy {
        HttpPolicy {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
            model: config.model.clone(),
            lora_r: config.lora_r,
            lora_alpha: config.lora_alpha,
            max_new_tokens: config.max_new_tokens,
            learning_rate: config.learning_rate,
            accumulate_steps: config.accumulate_steps,
        }
    }

    /// Post `body` to `route` and decode the response.
    fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<R, PolicyError> {
        let url = format!("{}/{route}", self.endpoint);
        let transport_err = |source| PolicyError::Transport {
            url: url.clone(),
            source,
        };

        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(transport_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PolicyError::Status {
                url,
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        response.json().map_err(transport_err)
    }
}

impl Policy for HttpPolicy {
    fn generate(
        &mut self,
        prompts: &[String],
        group_size: usize,
    ) -> Result<Vec<Vec<String>>, PolicyError> {
        let response: GenerateResponse = self.post(
            "generate",
            &GenerateRequest {
                model: &self.model,
                prompts,
                group_size,
                max_new_tokens: self.max_new_tokens,
            },
        )?;
        Ok(response.completions)
    }

    fn step(&mut self, rollout: &Rollout) -> Result<(), PolicyError> {
        self.post::<_, IgnoredAny>(
            "step",
            &StepRequest {
                rollout,
                model: &self.model,
                lora_r: self.lora_r,
                lora_alpha: self.lora_alpha,
                learning_rate: self.learning_rate,
                accumulate_steps: self.accumulate_steps,
            },
        )?;
        Ok(())
    }

    fn save(&mut self, dir: &Path) -> Result<(), PolicyError> {
        self.post::<_, IgnoredAny>("save", &SaveRequest { dir })?;
        Ok(())
    }
}
