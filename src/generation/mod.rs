//! Generation capability.
//!
//! The evaluation harness treats an LLM as a black box behind the
//! [`Generator`] trait: a system prompt and user message go in, text and
//! [`Usage`] come out. Two backends are provided:
//!
//! - [`AnthropicBackend`] — the hosted Messages API.
//! - [`OllamaBackend`] — a local Ollama server.
//!
//! Prompt construction lives in [`prompt`].

pub mod anthropic;
pub mod ollama;
pub mod prompt;

pub use anthropic::AnthropicBackend;
pub use ollama::{ollama_available, OllamaBackend};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A prior turn in a multi-turn conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub history: Vec<Message>,
}

/// Token counts, latency and cost of one generation.
///
/// `grounded` and `sources` are filled in by the caller that performed
/// retrieval; backends leave them at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Seconds taken by the request that succeeded. Failed attempts and
    /// retry backoff are not counted.
    pub latency_secs: f64,
    /// USD; `0.0` for local backends.
    pub cost: f64,
    pub grounded: bool,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: Usage,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend name for reports (`"anthropic"`, `"ollama"`).
    fn backend(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}
