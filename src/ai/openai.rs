use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::{AiError, TextGenerator};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Chat Completions client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<serde_json::Value>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: Option<String>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "OpenAI API HTTP error");
            return Err(AiError::Status(status.as_u16()));
        }

        let data: ChatResponse = resp.json().await?;
        if let Some(err) = data.error {
            return Err(AiError::Api(
                err.message.unwrap_or_else(|| "Unknown error".into()),
            ));
        }

        let first = data.choices.into_iter().next();
        let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
        let content = first.and_then(|c| c.message.content).unwrap_or_default();

        info!(
            usage = ?data.usage,
            finish_reason = ?finish_reason,
            content_length = content.len(),
            "AI model raw response"
        );
        Ok(content)
    }
}
