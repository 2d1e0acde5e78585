use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error};

use super::AiError;

lazy_static! {
    static ref THINK_RE: Regex = Regex::new(r"(?s)<think>.*?</think>").unwrap();
    static ref FENCE_RE: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\}|\[.*?\])\s*```").unwrap();
    static ref SPAN_RE: Regex = Regex::new(r"(?s)(\{.*\}|\[.*\])").unwrap();
}

fn decode(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

/// Pulls a JSON object or array out of a model reply.
///
/// Models wrap JSON in prose, code fences or reasoning traces; this tries,
/// in order: the whole reply, the first fenced block, the widest `{..}` or
/// `[..]` span.
pub fn parse_json_reply(content: &str) -> Result<Value, AiError> {
    debug!(length = content.len(), "parsing AI reply as JSON");

    let stripped = THINK_RE.replace_all(content, "");
    let stripped = stripped.trim();

    if let Some(v) = decode(stripped) {
        return Ok(v);
    }
    if let Some(v) = FENCE_RE
        .captures(stripped)
        .and_then(|c| c.get(1))
        .and_then(|m| decode(m.as_str()))
    {
        return Ok(v);
    }
    if let Some(v) = SPAN_RE
        .captures(stripped)
        .and_then(|c| c.get(1))
        .and_then(|m| decode(m.as_str()))
    {
        return Ok(v);
    }

    error!(raw_content = %content, "failed to parse JSON from AI response");
    let preview: String = stripped.chars().take(200).collect();
    Err(AiError::MalformedJson(preview))
}
