//! Interaction Classifier
//!
//! Classifies an idle user's message as either:
//! - LoanApplication: carries loan amount, duration and income in that order
//! - LoanInquiry: mentions a loan but not in the required format
//! - Conversational: everything else, handled by the language model

use crate::error::LoanAdvisorError;
use crate::models::LoanParameters;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LOAN_DETAILS: Regex = Regex::new(
        r"(?i)loan\s*amount\s*[-:]*\s*([0-9]+).*duration\s*[-:]*\s*([0-9]+).*income\s*[-:]*\s*([0-9]+)"
    )
    .expect("loan details pattern is valid");
}

const LOAN_KEYWORD: &str = "loan";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionType {
    LoanApplication(LoanParameters),
    /// Pattern matched but a number could not be represented
    InvalidLoanApplication(String),
    LoanInquiry,
    Conversational,
}

/// Interaction classifier
pub struct InteractionClassifier;

impl InteractionClassifier {
    pub fn classify(message: &str) -> InteractionType {
        if !message.to_lowercase().contains(LOAN_KEYWORD) {
            return InteractionType::Conversational;
        }

        match parse_loan_parameters(message) {
            Some(Ok(params)) => InteractionType::LoanApplication(params),
            Some(Err(e)) => InteractionType::InvalidLoanApplication(e.to_string()),
            None => InteractionType::LoanInquiry,
        }
    }
}

/// Extract loan parameters, `None` when the message does not match the pattern
pub fn parse_loan_parameters(message: &str) -> Option<Result<LoanParameters>> {
    let captures = LOAN_DETAILS.captures(message)?;

    let field = |index: usize, name: &str| -> Result<u64> {
        captures[index].parse::<u64>().map_err(|_| {
            LoanAdvisorError::InvalidLoanParameters(format!("{} is too large", name))
        })
    };

    let parsed = (|| -> Result<LoanParameters> {
        let loan_amount = field(1, "loan amount")?;
        let duration_years = u32::try_from(field(2, "duration")?).map_err(|_| {
            LoanAdvisorError::InvalidLoanParameters("duration is too large".to_string())
        })?;
        let income = field(3, "income")?;

        Ok(LoanParameters {
            loan_amount,
            duration_years,
            income,
        })
    })();

    Some(parsed)
}
