//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{AskError, Result};
use crate::llm::{
    gemini, openai, GeminiClient, GeminiConfig, LlmClient, LlmProvider, MockLlmClient,
    OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client from configuration.
///
/// The API key is resolved in order:
/// 1. `llm.api_key` from the config file
/// 2. Environment variable (`GEMINI_API_KEY` or `OPENAI_API_KEY`)
///
/// The model is resolved from `llm.model`, then `GEMINI_MODEL` / `OPENAI_MODEL`,
/// then the provider's default.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

    match config.provider()? {
        LlmProvider::Gemini => {
            let key = config
                .api_key
                .clone()
                .or_else(|| env("GEMINI_API_KEY"))
                .ok_or_else(|| {
                    AskError::config("No API key configured. Set GEMINI_API_KEY or llm.api_key.")
                })?;
            let model = config
                .model
                .clone()
                .or_else(|| env("GEMINI_MODEL"))
                .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string());
            Ok(Arc::new(GeminiClient::new(
                GeminiConfig::new(key, model).with_timeout(config.timeout_secs),
            )?))
        }
        LlmProvider::OpenAi => {
            let key = config
                .api_key
                .clone()
                .or_else(|| env("OPENAI_API_KEY"))
                .ok_or_else(|| {
                    AskError::config("No API key configured. Set OPENAI_API_KEY or llm.api_key.")
                })?;
            let model = config
                .model
                .clone()
                .or_else(|| env("OPENAI_MODEL"))
                .unwrap_or_else(|| openai::DEFAULT_MODEL.to_string());
            Ok(Arc::new(OpenAiClient::new(
                OpenAiConfig::new(key, model).with_timeout(config.timeout_secs),
            )?))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}
