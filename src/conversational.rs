//! Conversational interaction handler
//!
//! Free-form messages go straight to the text generator with the
//! conversation transcript as context. Any failure, empty answer or timeout
//! is replaced by a fixed reply, so this path never errors.

use crate::generator::TextGenerator;
use crate::memory::{ConversationHistory, PromptBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Reply used whenever the model cannot produce one
pub const FALLBACK_REPLY: &str = "I'm here to assist you!";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Model,
    Fallback,
}

/// Response for conversational interactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationalResponse {
    pub answer: String,
    pub source: ResponseSource,
    /// Transcript turns included in the prompt
    pub context_turns: usize,
}

impl ConversationalResponse {
    fn fallback(context_turns: usize) -> Self {
        Self {
            answer: FALLBACK_REPLY.to_string(),
            source: ResponseSource::Fallback,
            context_turns,
        }
    }
}

/// Answer a free-form message, bounded by `timeout`
pub async fn handle_conversational(
    generator: &dyn TextGenerator,
    prompt_builder: &PromptBuilder,
    history: &ConversationHistory,
    message: &str,
    timeout: Duration,
) -> ConversationalResponse {
    let prompt = prompt_builder.build(history, message);
    let context_turns = history.len();

    match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
        Ok(Ok(answer)) => {
            let answer = answer.trim();
            if answer.is_empty() {
                warn!(generator = generator.name(), "Empty model response, using fallback reply");
                return ConversationalResponse::fallback(context_turns);
            }

            info!(generator = generator.name(), context_turns, "Conversational response from model");
            ConversationalResponse {
                answer: answer.to_string(),
                source: ResponseSource::Model,
                context_turns,
            }
        }
        Ok(Err(e)) => {
            warn!(generator = generator.name(), "Model call failed: {}", e);
            ConversationalResponse::fallback(context_turns)
        }
        Err(_) => {
            warn!(generator = generator.name(), "Model call exceeded {:?}", timeout);
            ConversationalResponse::fallback(context_turns)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;

    const LIMIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_model_answer_is_trimmed() {
        let generator = MockGenerator::replying("  EMI is a monthly instalment.\n");
        let response = handle_conversational(
            &generator,
            &PromptBuilder::new(),
            &ConversationHistory::new(),
            "what is EMI?",
            LIMIT,
        )
        .await;

        assert_eq!(response.answer, "EMI is a monthly instalment.");
        assert_eq!(response.source, ResponseSource::Model);
    }

    #[tokio::test]
    async fn test_failures_use_fallback() {
        let cases: Vec<MockGenerator> = vec![
            MockGenerator::failing("boom"),
            MockGenerator::replying("   "),
            MockGenerator::stalling(Duration::from_secs(5)),
        ];

        for generator in cases {
            let response = handle_conversational(
                &generator,
                &PromptBuilder::new(),
                &ConversationHistory::new(),
                "hello",
                Duration::from_millis(50),
            )
            .await;

            assert_eq!(response.answer, FALLBACK_REPLY);
            assert_eq!(response.source, ResponseSource::Fallback);
        }
    }

    #[tokio::test]
    async fn test_prompt_includes_history() {
        let generator = MockGenerator::replying("ok");
        let mut history = ConversationHistory::new();
        history.push_exchange("my name is Asha", "Nice to meet you, Asha!");

        let response = handle_conversational(
            &generator,
            &PromptBuilder::new(),
            &history,
            "what is my name?",
            LIMIT,
        )
        .await;

        assert_eq!(response.context_turns, 2);
        let prompt = generator.last_prompt().await.unwrap();
        assert!(prompt.contains("user: my name is Asha"));
        assert!(prompt.contains("User: what is my name?"));
    }
}
