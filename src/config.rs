// src/config.rs

use std::time::Duration;

/// Configuration for the remote text-completion endpoint.
///
/// Built once at startup and handed to the model client explicitly; nothing
/// in the core reads environment variables on its own.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the inference service, without a trailing slash.
    pub endpoint: String,
    /// Model repository id appended to the endpoint, e.g.
    /// `mistralai/Mixtral-8x7B-Instruct-v0.1`.
    pub repo_id: String,
    /// Bearer token. `None` disables the client: every call fails fast and
    /// the pipeline degrades to its deterministic fallbacks.
    pub api_token: Option<String>,
    pub temperature: f32,
    pub max_new_tokens: u32,
    /// Per-call timeout. `None` waits indefinitely, which is the default:
    /// a slow response must not abort the pipeline mid-file.
    pub timeout: Option<Duration>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models".to_string(),
            repo_id: "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string(),
            api_token: None,
            temperature: 0.3,
            max_new_tokens: 150,
            timeout: None,
        }
    }
}
