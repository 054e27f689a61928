//! OpenAI-compatible chat completion client.
//!
//! Sends: POST {base_url}/chat/completions

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionModel, ModelConfig, ModelError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completion client for OpenAI and compatible servers.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client for the given key and base URL.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ModelError> {
        let http = Client::builder()
            .user_agent(concat!("autoreview/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from an API key stored in an environment variable.
    ///
    /// Returns `Ok(None)` when the variable is unset or empty.
    pub fn from_env(var: &str, base_url: &str) -> Result<Option<Self>, ModelError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim(), base_url).map(Some),
            _ => Ok(None),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn complete(&self, prompt: &str, config: &ModelConfig) -> Result<String, ModelError> {
        let request = build_request(prompt, config);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else {
                    ModelError::Network(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }

        let body: ChatResponse = response.json().await?;
        first_choice_content(body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn build_request<'a>(prompt: &'a str, config: &'a ModelConfig) -> ChatRequest<'a> {
    ChatRequest {
        model: &config.model,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    }
}

fn first_choice_content(body: ChatResponse) -> Result<String, ModelError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ModelError::EmptyResponse)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
