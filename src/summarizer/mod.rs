//! Summarizer trait and implementations
//!
//! The Summarizer turns computed facts into narrative insight.
//! It is opaque to the engine: it may be slow, and it may fail.
//! Nothing it returns feeds back into the numbers.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

pub mod gemini;
pub use gemini::GeminiSummarizer;

/// Natural-language synthesis collaborator (LLM controlled)
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        system_context: &str,
        structured_facts: &Value,
        instructions: &str,
    ) -> Result<String>;
}

/// A recorded call made against [`MockSummarizer`].
#[derive(Debug, Clone)]
pub struct SummarizeCall {
    pub system_context: String,
    pub structured_facts: Value,
    pub instructions: String,
}

/// Mock summarizer for development & testing
/// Keeps the engine functional without an LLM dependency
#[derive(Debug, Default)]
pub struct MockSummarizer {
    fail_marker: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<SummarizeCall>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call whose system context contains `marker`.
    pub fn failing_when(marker: impl Into<String>) -> Self {
        Self {
            fail_marker: Some(marker.into()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SummarizeCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        system_context: &str,
        structured_facts: &Value,
        instructions: &str,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SummarizeCall {
                system_context: system_context.to_string(),
                structured_facts: structured_facts.clone(),
                instructions: instructions.to_string(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(marker) = &self.fail_marker {
            if system_context.contains(marker.as_str()) {
                return Err(OrchestrationError::CollaboratorError(format!(
                    "mock summarizer rejected context matching '{}'",
                    marker
                )));
            }
        }

        let role = system_context.lines().next().unwrap_or("Analysis").trim();
        let fact_count = structured_facts.as_object().map(|o| o.len()).unwrap_or(0);

        Ok(format!(
            "[mock] {} Synthesized from {} fact groups. {}",
            role,
            fact_count,
            instructions.lines().next().unwrap_or_default().trim()
        ))
    }
}

/// Render facts as `key: value` lines for prompt context.
pub fn format_facts(structured_facts: &Value) -> String {
    match structured_facts {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
