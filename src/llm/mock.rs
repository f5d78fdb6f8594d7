//! Mock LLM client for testing.
//!
//! Provides deterministic responses: a queue of scripted completions is
//! served first, then pattern-matched responses, then a fallback.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{AskError, Result};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses.
///
/// Clones share the same script and call log, so a test can keep a handle
/// after passing the client to the service.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Completions returned in order before any pattern is consulted.
    script: Arc<Mutex<VecDeque<Result<String>>>>,
    /// Prompts received so far.
    prompts: Arc<Mutex<Vec<String>>>,
    /// Artificial latency per call.
    delay: Option<Duration>,
}

impl MockLlmClient {
    /// Creates a new mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the prompt's question section contains `pattern`, the mock will
    /// return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Queues a completion to be returned by the next unscripted call.
    pub fn push_response(&self, response: impl Into<String>) {
        self.lock_script().push_back(Ok(response.into()));
    }

    /// Queues a failure to be returned by the next call.
    pub fn push_error(&self, error: AskError) {
        self.lock_script().push_back(Err(error));
    }

    /// Delays every completion by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Generates a response based on the question part of the prompt.
    fn mock_response(&self, prompt: &str) -> String {
        let question = question_section(prompt).to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if question.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        let greetings = ["hello", "hi ", "how are you", "weather", "joke"];
        if greetings.iter().any(|g| question.contains(g)) {
            return "INVALID".to_string();
        }

        if question.contains("count") || question.contains("how many") {
            if let Some(table) = first_table(prompt) {
                return format!("```sql\nSELECT COUNT(*) AS total FROM {}\n```", table);
            }
        }

        match first_table(prompt) {
            Some(table) => format!("```sql\nSELECT * FROM {}\n```", table),
            None => "INVALID".to_string(),
        }
    }
}

/// Text between the question heading and the instructions, or the whole prompt.
fn question_section(prompt: &str) -> &str {
    let section = ["### User Question:", "### Original User Question:"]
        .iter()
        .find_map(|heading| prompt.find(heading).map(|i| &prompt[i..]))
        .unwrap_or(prompt);
    match section.find("### Instructions:") {
        Some(end) => &section[..end],
        None => section,
    }
}

/// First table named in the schema section of a prompt.
fn first_table(prompt: &str) -> Option<&str> {
    let start = prompt.find("Table '")? + "Table '".len();
    let len = prompt[start..].find('\'')?;
    Some(&prompt[start..start + len])
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.lock_script().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.mock_response(prompt)),
        }
    }
}
