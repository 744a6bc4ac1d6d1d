//! Prompt assembly for the generative fallback
//!
//! The prompt is a pure function of the instruction preamble, the transcript
//! and the new message, so identical state always yields an identical prompt.

use crate::memory::store::ConversationHistory;

pub const DEFAULT_PREAMBLE: &str = "You are a helpful loan advisory assistant.
Respond naturally and conversationally to the user's message.
Maintain conversation memory and respond accordingly.
When the user wants to apply for a loan, ask them to share their loan amount, duration and income.";

/// Builds the single combined prompt string sent to the model
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    preamble: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }

    pub fn with_preamble(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    pub fn build(&self, history: &ConversationHistory, user_message: &str) -> String {
        let mut prompt = String::with_capacity(self.preamble.len() + user_message.len() + 256);

        prompt.push_str(&self.preamble);
        prompt.push_str("\nHere is the conversation history:\n");
        prompt.push_str(&history.formatted());
        prompt.push_str("\n\nUser: ");
        prompt.push_str(user_message);
        prompt.push_str("\nAI: ");

        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
