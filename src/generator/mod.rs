//! Text generator trait and implementations
//!
//! The generative fallback only needs "prompt in, text out, may fail".
//! Keeping that behind a trait lets the dialogue controller run against a
//! stub in tests.

use crate::error::LoanAdvisorError;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

/// Trait for free-form text completion (LLM controlled)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Reply(String),
    Fail(String),
    Stall(Duration),
}

/// Scripted generator for development & testing.
/// Records every prompt it receives.
pub struct MockGenerator {
    behavior: MockBehavior,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Reply(reply.into()))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(reason.into()))
    }

    /// Sleeps for `delay` before replying, for timeout paths
    pub fn stalling(delay: Duration) -> Self {
        Self::with_behavior(MockBehavior::Stall(delay))
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().await.last().cloned()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().await.push(prompt.to_string());

        match &self.behavior {
            MockBehavior::Reply(reply) => Ok(reply.clone()),
            MockBehavior::Fail(reason) => Err(LoanAdvisorError::Llm(reason.clone())),
            MockBehavior::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("late reply".to_string())
            }
        }
    }
}
