// src/model/mod.rs
//
// Remote text-completion collaborator. The pipeline only depends on the
// `TextCompletion` capability; the HTTP implementation targets the Hugging
// Face Inference API. One attempt per call, no retry: a failed call is the
// caller's cue to fall back deterministically.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ModelConfig;

/// A single blocking text-completion call.
pub trait TextCompletion {
    fn complete(&self, prompt: &str, temperature: f32, max_new_tokens: u32) -> Result<String>;
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Serialize)]
struct InferenceParameters {
    temperature: f32,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Hugging Face Inference API client.
pub struct HfEndpoint {
    config: ModelConfig,
    client: reqwest::blocking::Client,
    url: Url,
}

impl HfEndpoint {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let url = Url::parse(&format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.repo_id
        ))
        .with_context(|| format!("invalid inference URL for {}", config.repo_id))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            config,
            client,
            url,
        })
    }
}

impl TextCompletion for HfEndpoint {
    fn complete(&self, prompt: &str, temperature: f32, max_new_tokens: u32) -> Result<String> {
        let Some(token) = &self.config.api_token else {
            bail!("no API token configured; model calls are disabled");
        };

        let body = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                temperature,
                max_new_tokens,
                return_full_text: false,
            },
        };

        let generated: Vec<GeneratedText> = self
            .client
            .post(self.url.as_str())
            .bearer_auth(token)
            .json(&body)
            .send()
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("non-success status from {}", self.url))?
            .json()
            .with_context(|| format!("decoding completion from {}", self.url))?;

        match generated.into_iter().next() {
            Some(g) => Ok(g.generated_text.trim().to_string()),
            None => bail!("empty completion list from {}", self.url),
        }
    }
}
