//! Completion-model boundary.
//!
//! The model is an opaque collaborator: a prompt goes in, text that should
//! parse as JSON comes out. This module holds the trait every backend
//! implements, the per-task model configuration and the usage counters.

mod manager;
mod openai;
mod usage;

pub use manager::{ModelConfig, ModelManager, ModelOverride, TaskType};
pub use openai::{OpenAiClient, DEFAULT_BASE_URL};
pub use usage::{estimate_tokens, UsageCounter, UsageTracker};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during a completion call.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by model provider")]
    RateLimited,
    #[error("model API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    InvalidOutput(String),
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send a prompt and return the raw completion text.
    async fn complete(&self, prompt: &str, config: &ModelConfig) -> Result<String, ModelError>;

    /// Provider name, for logging.
    fn name(&self) -> &str;
}
