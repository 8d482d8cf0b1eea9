//! Gemini-powered summarizer
//!
//! Sends the task's role as the system instruction and the computed facts
//! plus the request as a single user turn.

use super::{format_facts, Summarizer};
use crate::config::SummarizerSettings;
use crate::gemini::GeminiClient;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

pub struct GeminiSummarizer {
    client: GeminiClient,
}

impl GeminiSummarizer {
    pub fn new(settings: &SummarizerSettings) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(settings)?,
        })
    }

    fn build_prompt(structured_facts: &Value, instructions: &str) -> String {
        format!(
            "CONTEXT:\n{}\n\nUSER REQUEST:\n{}",
            format_facts(structured_facts),
            instructions
        )
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        system_context: &str,
        structured_facts: &Value,
        instructions: &str,
    ) -> Result<String> {
        let prompt = Self::build_prompt(structured_facts, instructions);
        self.client.generate(system_context, &prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_layout() {
        let prompt = GeminiSummarizer::build_prompt(
            &json!({"runway": {"runway_months": 8.5}}),
            "Summarize the runway.",
        );
        assert!(prompt.starts_with("CONTEXT:\nrunway: {\"runway_months\":8.5}"));
        assert!(prompt.ends_with("USER REQUEST:\nSummarize the runway."));
    }
}
