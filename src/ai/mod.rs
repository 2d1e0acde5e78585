//! Text-generation collaborator.
//!
//! Every AI-backed feature talks to a single capability: send a system
//! instruction plus a user prompt, get text back. Providers only differ in
//! how they shape the HTTP request and where the reply text lives.

mod json;
mod openai;
mod openrouter;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::{AiConfig, AiProvider};

pub use json::parse_json_reply;
pub use openai::OpenAiClient;
pub use openrouter::OpenRouterClient;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("request to AI provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI provider returned HTTP {0}")]
    Status(u16),

    #[error("AI provider error: {0}")]
    Api(String),

    #[error("could not parse JSON from AI response: {0}")]
    MalformedJson(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Raw assistant text for a system + user prompt pair.
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError>;

    /// Same as [`TextGenerator::chat`], decoded as a JSON object or array.
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value, AiError> {
        let content = self.chat(system_prompt, user_prompt).await?;
        parse_json_reply(&content)
    }
}

pub fn from_config(cfg: &AiConfig) -> anyhow::Result<Arc<dyn TextGenerator>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?;

    let generator: Arc<dyn TextGenerator> = match cfg.provider {
        AiProvider::OpenAi => Arc::new(OpenAiClient::new(
            http,
            cfg.api_key.clone(),
            cfg.model.clone(),
            cfg.temperature,
        )),
        AiProvider::OpenRouter => Arc::new(OpenRouterClient::new(
            http,
            cfg.api_key.clone(),
            cfg.model.clone(),
            cfg.temperature,
        )),
    };
    Ok(generator)
}

/// Rejects replies where the model itself flagged a failure.
pub fn ensure_no_error_flag(value: &Value, what: &str) -> Result<(), String> {
    match value.get("error") {
        Some(err) => {
            let detail = err
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string());
            Err(format!("AI could not generate a valid {what}: {detail}"))
        }
        None => Ok(()),
    }
}
