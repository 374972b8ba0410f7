//! Anthropic Messages API backend.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{Generation, GenerationRequest, Generator, Role, Usage};
use crate::config::GenerationConfig;
use crate::http::post_json_timed;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    api_key: String,
    model: String,
    max_tokens: u32,
    input_price_per_mtok: f64,
    output_price_per_mtok: f64,
    max_retries: u32,
    client: reqwest::Client,
}

/// `ANTHROPIC_API_KEY`, if set and non-empty.
pub fn api_key_from_env() -> Option<String> {
    std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}

impl AnthropicBackend {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            api_key,
            model: config.anthropic_model.clone(),
            max_tokens: config.max_tokens,
            input_price_per_mtok: config.input_price_per_mtok,
            output_price_per_mtok: config.output_price_per_mtok,
            max_retries: config.max_retries,
            client,
        })
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 / 1_000_000.0 * self.input_price_per_mtok
            + output_tokens as f64 / 1_000_000.0 * self.output_price_per_mtok
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = request
            .history
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        messages.push(serde_json::json!({
            "role": Role::User.as_str(),
            "content": request.user_message,
        }));

        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": request.system_prompt,
            "messages": messages,
        })
    }
}

#[async_trait]
impl Generator for AnthropicBackend {
    fn backend(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let body = self.request_body(request);
        let response = post_json_timed(
            &self.client,
            MESSAGES_URL,
            &[
                ("x-api-key", self.api_key.clone()),
                ("anthropic-version", API_VERSION.to_string()),
            ],
            &body,
            self.max_retries,
            "Anthropic",
        )
        .await?;
        let json = response.body;
        let latency_secs = response.elapsed.as_secs_f64();

        let (text, input_tokens, output_tokens) = parse_response(&json)?;
        Ok(Generation {
            text,
            usage: Usage {
                input_tokens,
                output_tokens,
                latency_secs,
                cost: self.cost(input_tokens, output_tokens),
                ..Usage::default()
            },
        })
    }
}

/// Concatenated text blocks and token counts from a Messages response.
fn parse_response(json: &serde_json::Value) -> Result<(String, u64, u64)> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Anthropic response: missing content"))?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        bail!("Invalid Anthropic response: no text content");
    }

    let usage = json.get("usage");
    let tokens = |field: &str| {
        usage
            .and_then(|u| u.get(field))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };
    Ok((text, tokens("input_tokens"), tokens("output_tokens")))
}
