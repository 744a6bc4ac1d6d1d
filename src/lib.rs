//! Loan Advisor
//!
//! A chat backend that:
//! - Collects loan amount, duration and income from free text
//! - Confirms the applicant by registered mobile number
//! - Ranks bank offers deterministically against the applicant's CIBIL score
//! - Hands everything else to a language model with a rolling transcript
//!
//! MESSAGE → CLASSIFY → (LOAN FLOW | GENERATIVE FALLBACK) → RECORD → REPLY

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod conversational;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod matcher;
pub mod memory;
pub mod models;
pub mod state;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::{DialogueController, DialogueOutcome, DialogueReply};
pub use classifier::{InteractionClassifier, InteractionType};
