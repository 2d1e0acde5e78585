use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use super::{AiError, TextGenerator};

const API_URL: &str = "https://openrouter.ai/api/v1/responses";
const DEFAULT_MODEL: &str = "arcee-ai/trinity-large-preview:free";
const DEFAULT_TEMPERATURE: f32 = 0.4;

/// OpenRouter client speaking the Responses API.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    temperature: f32,
    input: Vec<InputMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
    status: Option<String>,
    usage: Option<serde_json::Value>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl OpenRouterClient {
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

/// First `output_text` block of the first assistant message.
fn output_text(reply: &ResponsesReply) -> Option<&str> {
    reply
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .find(|block| block.kind == "output_text")
        .map(|block| block.text.as_deref().unwrap_or(""))
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AiError> {
        let body = ResponsesRequest {
            model: &self.model,
            temperature: self.temperature,
            input: vec![
                InputMessage { kind: "message", role: "system", content: system_prompt },
                InputMessage { kind: "message", role: "user", content: user_prompt },
            ],
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
            error!(status = status.as_u16(), %body, "OpenRouter API HTTP error");
            return Err(AiError::Status(status.as_u16()));
        }

        let data: ResponsesReply = resp.json().await?;
        if let Some(err) = &data.error {
            return Err(AiError::Api(
                err.message.clone().unwrap_or_else(|| "Unknown error".into()),
            ));
        }

        let content = match output_text(&data) {
            Some(text) => text.to_string(),
            None => {
                warn!(status = ?data.status, "OpenRouter: no output_text in response");
                String::new()
            }
        };

        info!(
            usage = ?data.usage,
            status = ?data.status,
            content_length = content.len(),
            "AI model raw response"
        );
        Ok(content)
    }
}
