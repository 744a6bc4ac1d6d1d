//! Dialogue controller - the per-user loan conversation state machine
//!
//! IDLE ──(loan details)──▶ AWAITING_MOBILE ──(any message)──▶ IDLE
//!
//! Idle messages that do not carry loan details either get a format hint
//! (they mention a loan) or go to the generative fallback.

use crate::classifier::{InteractionClassifier, InteractionType};
use crate::conversational::{self, ResponseSource};
use crate::dataset::{CustomerLookup, Datasets};
use crate::generator::TextGenerator;
use crate::matcher::{LoanMatcher, LoanSuggestion, MIN_CIBIL_SCORE};
use crate::memory::{ConversationMemory, PromptBuilder};
use crate::models::{LoanParameters, PendingLoanRequest};
use crate::state::SessionStore;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const MOBILE_PROMPT: &str =
    "Thank you! Please provide your registered mobile number to proceed with your loan application.";

pub const DETAILS_PROMPT: &str =
    "To apply for a loan, please provide **loan amount**, **duration**, and **income**.";

pub const CUSTOMER_DATA_UNAVAILABLE: &str =
    "Sorry, customer records are not available at the moment. Please try again later.";

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// What the controller did with a message
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DialogueOutcome {
    MobileRequested,
    DetailsRequested,
    InvalidDetails,
    Recommended,
    NoMatch,
    Ineligible,
    LoanDataUnavailable,
    CustomerDataUnavailable,
    CustomerNotFound,
    Conversational(ResponseSource),
}

#[derive(Debug, Clone, Serialize)]
pub struct DialogueReply {
    pub reply: String,
    pub outcome: DialogueOutcome,
}

impl DialogueReply {
    fn new(reply: impl Into<String>, outcome: DialogueOutcome) -> Self {
        Self {
            reply: reply.into(),
            outcome,
        }
    }
}

pub struct DialogueController {
    sessions: Arc<dyn SessionStore>,
    memory: Arc<ConversationMemory>,
    generator: Arc<dyn TextGenerator>,
    datasets: Arc<Datasets>,
    matcher: LoanMatcher,
    prompt_builder: PromptBuilder,
    generation_timeout: Duration,
}

impl DialogueController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        memory: Arc<ConversationMemory>,
        generator: Arc<dyn TextGenerator>,
        datasets: Arc<Datasets>,
    ) -> Self {
        let matcher = LoanMatcher::new(Arc::clone(&datasets.offers));

        Self {
            sessions,
            memory,
            generator,
            datasets,
            matcher,
            prompt_builder: PromptBuilder::new(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// Handle one message from `user_id` and record the exchange
    pub async fn handle(&self, user_id: &str, message: &str) -> Result<DialogueReply> {
        let reply = match self.sessions.take(user_id).await? {
            Some(pending) => {
                debug!(user_id, step = %pending.step, "Resolving pending loan request");
                self.resolve_mobile(&pending, message)
            }
            None => self.handle_idle(user_id, message).await?,
        };

        info!(user_id, outcome = ?reply.outcome, "Dialogue turn complete");

        self.memory
            .record_exchange(user_id, message, &reply.reply)
            .await;

        Ok(reply)
    }

    async fn handle_idle(&self, user_id: &str, message: &str) -> Result<DialogueReply> {
        match InteractionClassifier::classify(message) {
            InteractionType::LoanApplication(params) => {
                self.start_application(user_id, params).await
            }
            InteractionType::InvalidLoanApplication(reason) => Ok(DialogueReply::new(
                format!(
                    "Sorry, I couldn't use those loan details ({}). Please provide **loan amount**, **duration** (in years), and **income** as whole numbers.",
                    reason
                ),
                DialogueOutcome::InvalidDetails,
            )),
            InteractionType::LoanInquiry => Ok(DialogueReply::new(
                DETAILS_PROMPT,
                DialogueOutcome::DetailsRequested,
            )),
            InteractionType::Conversational => {
                let history = self.memory.snapshot(user_id).await;
                let response = conversational::handle_conversational(
                    self.generator.as_ref(),
                    &self.prompt_builder,
                    &history,
                    message,
                    self.generation_timeout,
                )
                .await;

                Ok(DialogueReply::new(
                    response.answer,
                    DialogueOutcome::Conversational(response.source),
                ))
            }
        }
    }

    async fn start_application(
        &self,
        user_id: &str,
        params: LoanParameters,
    ) -> Result<DialogueReply> {
        info!(
            user_id,
            loan_amount = params.loan_amount,
            duration_years = params.duration_years,
            income = params.income,
            "Loan application started"
        );

        self.sessions
            .set(user_id, PendingLoanRequest::awaiting_mobile(params))
            .await?;

        Ok(DialogueReply::new(MOBILE_PROMPT, DialogueOutcome::MobileRequested))
    }

    /// Treat `message` as the mobile number for a pending request
    fn resolve_mobile(&self, pending: &PendingLoanRequest, message: &str) -> DialogueReply {
        let mobile_number = message.trim();

        let customer = match self.datasets.find_customer(mobile_number) {
            CustomerLookup::Found(customer) => customer,
            CustomerLookup::NotFound => {
                return DialogueReply::new(
                    format!(
                        "We couldn't find your details in our records for mobile number {}. Please try again with a registered mobile number.",
                        mobile_number
                    ),
                    DialogueOutcome::CustomerNotFound,
                );
            }
            CustomerLookup::Unavailable => {
                return DialogueReply::new(
                    CUSTOMER_DATA_UNAVAILABLE,
                    DialogueOutcome::CustomerDataUnavailable,
                );
            }
        };

        let score = match customer.cibil_score() {
            Some(score) if score >= MIN_CIBIL_SCORE => score,
            Some(score) => {
                return DialogueReply::new(
                    format!(
                        "We found your details for mobile number {}. However, your CIBIL score of {} is below the required {}. You are not eligible for a loan at this time.",
                        mobile_number, score, MIN_CIBIL_SCORE
                    ),
                    DialogueOutcome::Ineligible,
                );
            }
            None => {
                return DialogueReply::new(
                    format!(
                        "We found your details for mobile number {}. However, your record has no valid CIBIL score and a minimum of {} is required. You are not eligible for a loan at this time.",
                        mobile_number, MIN_CIBIL_SCORE
                    ),
                    DialogueOutcome::Ineligible,
                );
            }
        };

        let suggestion = self.matcher.suggest(
            pending.loan_amount,
            pending.income,
            pending.duration_years,
            Some(score),
        );

        let outcome = match &suggestion {
            LoanSuggestion::Offers { .. } => DialogueOutcome::Recommended,
            LoanSuggestion::NoMatch => DialogueOutcome::NoMatch,
            LoanSuggestion::Ineligible => DialogueOutcome::Ineligible,
            LoanSuggestion::Unavailable => DialogueOutcome::LoanDataUnavailable,
        };

        DialogueReply::new(
            format!(
                "Verifying your details for mobile number {}:\n{}",
                mobile_number, suggestion
            ),
            outcome,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversational::FALLBACK_REPLY;
    use crate::generator::MockGenerator;
    use crate::memory::{MemoryScope, MessageRole};
    use crate::models::{BankLoanOffer, CustomerRecord};
    use crate::state::InMemorySessionStore;
    use std::collections::BTreeMap;

    const APPLICATION: &str = "loan amount 500000 duration 5 income 80000";

    fn customer(mobile: &str, score: &str) -> CustomerRecord {
        CustomerRecord {
            mobile_number: mobile.to_string(),
            cibil_score_raw: score.to_string(),
            profile: BTreeMap::new(),
        }
    }

    fn offer() -> BankLoanOffer {
        BankLoanOffer {
            bank_name: "State Bank of India".to_string(),
            loan_type: "Personal Loan".to_string(),
            interest_rate: "8.5".to_string(),
            minimum_income: "50000".to_string(),
            maximum_loan_amount: "600000".to_string(),
            loan_tenure_years: "10".to_string(),
            cibil_score_requirement: "700".to_string(),
            processing_fee: "1".to_string(),
            prepayment_charges: "0".to_string(),
        }
    }

    struct Harness {
        controller: DialogueController,
        sessions: Arc<InMemorySessionStore>,
        generator: Arc<MockGenerator>,
    }

    fn harness_with(
        datasets: Datasets,
        generator: MockGenerator,
        scope: MemoryScope,
        ttl: Duration,
    ) -> Harness {
        let sessions = Arc::new(InMemorySessionStore::new(ttl));
        let generator = Arc::new(generator);
        let controller = DialogueController::new(
            sessions.clone(),
            Arc::new(ConversationMemory::new(scope, 10)),
            generator.clone(),
            Arc::new(datasets),
        )
        .with_generation_timeout(Duration::from_millis(200));

        Harness {
            controller,
            sessions,
            generator,
        }
    }

    fn harness(customers: Vec<CustomerRecord>) -> Harness {
        harness_with(
            Datasets::new(customers, vec![offer()]),
            MockGenerator::replying("Happy to help."),
            MemoryScope::Shared,
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_application_moves_to_awaiting_mobile() {
        let h = harness(vec![customer("9999999999", "750")]);

        let reply = h.controller.handle("fresh-user", APPLICATION).await.unwrap();
        assert_eq!(reply.outcome, DialogueOutcome::MobileRequested);
        assert!(reply.reply.contains("mobile number"));

        let pending = h.sessions.get("fresh-user").await.unwrap().unwrap();
        assert_eq!(pending.loan_amount, 500000);
        assert_eq!(pending.duration_years, 5);
        assert_eq!(pending.income, 80000);

        // any follow-up resolves the request
        h.controller.handle("fresh-user", "hello there").await.unwrap();
        assert!(h.sessions.get("fresh-user").await.unwrap().is_none());
        assert!(h.generator.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn test_eligible_customer_gets_offers() {
        let h = harness(vec![customer("9999999999", "750")]);

        h.controller.handle("u1", APPLICATION).await.unwrap();
        let reply = h.controller.handle("u1", "9999999999").await.unwrap();

        assert_eq!(reply.outcome, DialogueOutcome::Recommended);
        assert!(reply.reply.starts_with("Verifying your details for mobile number 9999999999:\n"));
        assert!(reply.reply.contains("State Bank of India"));
        assert!(reply.reply.contains("8.5"));
        assert!(h.sessions.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_low_score_is_ineligible() {
        let h = harness(vec![customer("9999999999", "650")]);

        h.controller.handle("u1", APPLICATION).await.unwrap();
        let reply = h.controller.handle("u1", " 9999999999 ").await.unwrap();

        assert_eq!(reply.outcome, DialogueOutcome::Ineligible);
        assert!(reply.reply.contains("CIBIL score of 650 is below the required 700"));
        assert!(!reply.reply.contains("State Bank of India"));
        assert!(!reply.reply.contains("8.5"));
        assert!(h.sessions.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_mobile_number() {
        let h = harness(vec![customer("9999999999", "750")]);

        h.controller.handle("u1", APPLICATION).await.unwrap();
        let reply = h.controller.handle("u1", "0000000000").await.unwrap();

        assert_eq!(reply.outcome, DialogueOutcome::CustomerNotFound);
        assert!(reply.reply.contains("couldn't find your details"));
        assert!(h.sessions.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_offer_fits() {
        let h = harness(vec![customer("9999999999", "750")]);

        h.controller
            .handle("u1", "loan amount 900000 duration 5 income 80000")
            .await
            .unwrap();
        let reply = h.controller.handle("u1", "9999999999").await.unwrap();

        assert_eq!(reply.outcome, DialogueOutcome::NoMatch);
        assert!(reply.reply.contains("couldn't find a suitable loan option"));
    }

    #[tokio::test]
    async fn test_missing_datasets_degrade_to_text() {
        let h = harness_with(
            Datasets::default(),
            MockGenerator::replying("unused"),
            MemoryScope::Shared,
            Duration::from_secs(600),
        );

        h.controller.handle("u1", APPLICATION).await.unwrap();
        let reply = h.controller.handle("u1", "9999999999").await.unwrap();
        assert_eq!(reply.outcome, DialogueOutcome::CustomerDataUnavailable);
        assert_eq!(reply.reply, CUSTOMER_DATA_UNAVAILABLE);

        let h = harness_with(
            Datasets::new(vec![customer("9999999999", "750")], vec![]),
            MockGenerator::replying("unused"),
            MemoryScope::Shared,
            Duration::from_secs(600),
        );

        h.controller.handle("u1", APPLICATION).await.unwrap();
        let reply = h.controller.handle("u1", "9999999999").await.unwrap();
        assert_eq!(reply.outcome, DialogueOutcome::LoanDataUnavailable);
        assert!(reply.reply.contains("bank loan data is not available"));
    }

    #[tokio::test]
    async fn test_loan_mention_without_details() {
        let h = harness(vec![]);

        let reply = h.controller.handle("u1", "Can I get a LOAN?").await.unwrap();
        assert_eq!(reply.outcome, DialogueOutcome::DetailsRequested);
        assert_eq!(reply.reply, DETAILS_PROMPT);
        assert!(h.sessions.get("u1").await.unwrap().is_none());
        assert!(h.generator.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_numbers_get_clarification() {
        let h = harness(vec![]);

        let reply = h
            .controller
            .handle("u1", "loan amount 123456789012345678901234567890 duration 5 income 80000")
            .await
            .unwrap();

        assert_eq!(reply.outcome, DialogueOutcome::InvalidDetails);
        assert!(reply.reply.contains("loan amount"));
        assert!(h.sessions.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_free_text_uses_generator_without_touching_sessions() {
        let h = harness(vec![customer("9999999999", "750")]);

        h.controller.handle("alice", APPLICATION).await.unwrap();
        let reply = h.controller.handle("bob", "what is an EMI?").await.unwrap();

        assert_eq!(reply.outcome, DialogueOutcome::Conversational(ResponseSource::Model));
        assert_eq!(reply.reply, "Happy to help.");
        assert!(h.sessions.get("alice").await.unwrap().is_some());
        assert!(h.sessions.get("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generator_failure_uses_fallback_reply() {
        let h = harness_with(
            Datasets::default(),
            MockGenerator::failing("upstream down"),
            MemoryScope::Shared,
            Duration::from_secs(600),
        );

        let reply = h.controller.handle("u1", "hello").await.unwrap();
        assert_eq!(reply.reply, FALLBACK_REPLY);
        assert_eq!(reply.outcome, DialogueOutcome::Conversational(ResponseSource::Fallback));

        let history = h.controller.memory().snapshot("u1").await;
        assert_eq!(history.formatted(), format!("user: hello\nbot: {}", FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn test_transcript_keeps_last_ten_turns() {
        let h = harness(vec![]);

        for i in 0..8 {
            h.controller.handle("u1", &format!("question {}", i)).await.unwrap();
        }

        let history = h.controller.memory().snapshot("u1").await;
        assert_eq!(history.len(), 10);

        let messages: Vec<&str> = history.turns().map(|t| t.message.as_str()).collect();
        assert!(!messages.contains(&"question 0"));
        assert!(!messages.contains(&"question 2"));
        assert_eq!(messages[0], "question 3");
        assert_eq!(messages[8], "question 7");
        assert_eq!(history.turns().last().map(|t| t.role), Some(MessageRole::Bot));
    }

    #[tokio::test]
    async fn test_shared_transcript_reaches_other_users() {
        let h = harness(vec![]);

        h.controller.handle("alice", "my salary is confidential").await.unwrap();
        h.controller.handle("bob", "hi").await.unwrap();

        let prompt = h.generator.last_prompt().await.unwrap();
        assert!(prompt.contains("user: my salary is confidential"));
    }

    #[tokio::test]
    async fn test_per_user_transcript_stays_private() {
        let h = harness_with(
            Datasets::default(),
            MockGenerator::replying("ok"),
            MemoryScope::PerUser,
            Duration::from_secs(600),
        );

        h.controller.handle("alice", "my salary is confidential").await.unwrap();
        h.controller.handle("bob", "hi").await.unwrap();

        let prompt = h.generator.last_prompt().await.unwrap();
        assert!(!prompt.contains("confidential"));
    }

    #[tokio::test]
    async fn test_expired_request_is_treated_as_idle() {
        let h = harness_with(
            Datasets::new(vec![customer("9999999999", "750")], vec![offer()]),
            MockGenerator::replying("Hello!"),
            MemoryScope::Shared,
            Duration::from_millis(20),
        );

        h.controller.handle("u1", APPLICATION).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let reply = h.controller.handle("u1", "9999999999").await.unwrap();
        assert_eq!(reply.outcome, DialogueOutcome::Conversational(ResponseSource::Model));
        assert_eq!(reply.reply, "Hello!");
    }

    #[tokio::test]
    async fn test_loan_flow_exchanges_are_recorded() {
        let h = harness(vec![customer("9999999999", "750")]);

        h.controller.handle("u1", APPLICATION).await.unwrap();
        let history = h.controller.memory().snapshot("u1").await;

        assert_eq!(
            history.formatted(),
            format!("user: {}\nbot: {}", APPLICATION, MOBILE_PROMPT)
        );
    }
}
