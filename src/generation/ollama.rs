//! Local Ollama backend (`POST /api/generate`, non-streaming).

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::{Generation, GenerationRequest, Generator, Usage};
use crate::config::GenerationConfig;
use crate::http::post_json_timed;

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct OllamaBackend {
    url: String,
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            max_retries: config.max_retries,
            client,
        })
    }
}

/// Single prompt for `/api/generate`: system prompt, any prior turns, then
/// the user message, separated by horizontal rules.
fn build_prompt(request: &GenerationRequest) -> String {
    let mut parts = vec![request.system_prompt.clone()];
    for m in &request.history {
        parts.push(format!("{}: {}", m.role.as_str(), m.content));
    }
    parts.push(request.user_message.clone());
    parts.join("\n\n---\n\n")
}

#[async_trait]
impl Generator for OllamaBackend {
    fn backend(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(request),
            "stream": false,
        });

        let response = post_json_timed(
            &self.client,
            &format!("{}/api/generate", self.url),
            &[],
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        let json = response.body;
        let latency_secs = response.elapsed.as_secs_f64();

        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response"))?
            .to_string();
        let tokens = |field: &str| json.get(field).and_then(|v| v.as_u64()).unwrap_or(0);

        Ok(Generation {
            text,
            usage: Usage {
                input_tokens: tokens("prompt_eval_count"),
                output_tokens: tokens("eval_count"),
                latency_secs,
                cost: 0.0,
                ..Usage::default()
            },
        })
    }
}

/// Whether an Ollama server at `url` answers `/api/tags` within two seconds
/// and lists at least one model.
pub async fn ollama_available(url: &str) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(AVAILABILITY_TIMEOUT)
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };

    let endpoint = format!("{}/api/tags", url.trim_end_matches('/'));
    let response = match client.get(&endpoint).send().await {
        Ok(r) if r.status().is_success() => r,
        _ => return false,
    };

    match response.json::<serde_json::Value>().await {
        Ok(json) => json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| !models.is_empty())
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{Message, Role};

    #[test]
    fn test_prompt_joins_system_and_user() {
        let req = GenerationRequest {
            system_prompt: "SYSTEM".into(),
            user_message: "USER".into(),
            history: Vec::new(),
        };
        assert_eq!(build_prompt(&req), "SYSTEM\n\n---\n\nUSER");
    }

    #[test]
    fn test_prompt_includes_history_in_order() {
        let req = GenerationRequest {
            system_prompt: "S".into(),
            user_message: "U".into(),
            history: vec![Message { role: Role::Assistant, content: "A".into() }],
        };
        assert_eq!(build_prompt(&req), "S\n\n---\n\nassistant: A\n\n---\n\nU");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 9 (discard) is not an HTTP server.
        assert!(!ollama_available("http://127.0.0.1:9").await);
    }

    #[tokio::test]
    async fn test_latency_excludes_retry_backoff() {
        let url = crate::http::test_server::serve(vec![
            (500, r#"{"error":"model loading"}"#),
            (200, r#"{"response":"Slow down.","prompt_eval_count":12,"eval_count":3}"#),
        ])
        .await;
        let config = GenerationConfig {
            ollama_url: url,
            max_retries: 1,
            ..GenerationConfig::default()
        };
        let backend = OllamaBackend::new(&config).unwrap();
        let req = GenerationRequest {
            system_prompt: "S".into(),
            user_message: "U".into(),
            history: Vec::new(),
        };

        let generation = backend.generate(&req).await.unwrap();
        assert_eq!(generation.text, "Slow down.");
        assert_eq!(generation.usage.input_tokens, 12);
        assert_eq!(generation.usage.output_tokens, 3);
        assert!(generation.usage.latency_secs < 1.0);
    }
}
