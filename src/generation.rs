//! Text generation providers.
//!
//! - **[`DisabledGenerator`]**: always fails; the bulk job records the
//!   failure per topic.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions`, sharing the
//!   retry policy of [`crate::embedding`].

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use evidence_harness_core::generation::{Generation, Generator, TokenUsage};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::embedding::{openai_api_key, post_with_retry};
use crate::error::CollaboratorError;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _context: &str, _instruction: &str) -> Result<Generation> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

pub struct OpenAIGenerator {
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = openai_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    /// The instruction goes in the system message, the context block in the
    /// user message.
    async fn generate(&self, context: &str, instruction: &str) -> Result<Generation> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": context },
            ],
        });
        let json = post_with_retry(
            &self.client,
            OPENAI_CHAT_URL,
            &self.api_key,
            &body,
            self.max_retries,
            "generation",
        )
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<Generation> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            CollaboratorError::new(
                "generation",
                "invalid OpenAI response: missing choices[0].message.content",
            )
        })?
        .to_string();
    let usage = json
        .get("usage")
        .map(|u| serde_json::from_value::<TokenUsage>(u.clone()))
        .transpose()
        .map_err(|e| CollaboratorError::new("generation", format!("invalid usage block: {}", e)))?
        .unwrap_or_default();
    Ok(Generation { text, usage })
}

/// Create the [`Generator`] named by the configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "• One" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        });
        let g = parse_chat_response(&json).unwrap();
        assert_eq!(g.text, "• One");
        assert_eq!(g.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_chat_response_without_usage() {
        let json = serde_json::json!({ "choices": [{ "message": { "content": "ok" } }] });
        assert_eq!(parse_chat_response(&json).unwrap().usage, TokenUsage::default());
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_malformed_reply_is_a_collaborator_error() {
        let err = parse_chat_response(&serde_json::json!({ "choices": [] })).unwrap_err();
        let collab = err.downcast_ref::<CollaboratorError>().unwrap();
        assert_eq!(collab.service, "generation");
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "ok" } }],
            "usage": { "total_tokens": "many" }
        });
        let err = parse_chat_response(&json).unwrap_err();
        assert!(err.downcast_ref::<CollaboratorError>().is_some());
    }
}
