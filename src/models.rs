//! Core data models for the loan advisor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

//
// ================= CSV Headers =================
//

pub const MOBILE_NUMBER: &str = "mobile_number";
pub const CIBIL_SCORE: &str = "cibil_score";

pub const BANK_NAME: &str = "Bank Name";
pub const LOAN_TYPE: &str = "Loan Type";
pub const INTEREST_RATE: &str = "Interest Rate (%)";
pub const MINIMUM_INCOME: &str = "Minimum Income Required (INR)";
pub const MAXIMUM_LOAN_AMOUNT: &str = "Maximum Loan Amount (INR)";
pub const LOAN_TENURE: &str = "Loan Tenure (years)";
pub const CIBIL_REQUIREMENT: &str = "CIBIL Score Requirement";
pub const PROCESSING_FEE: &str = "Processing Fee (%)";
pub const PREPAYMENT_CHARGES: &str = "Prepayment Charges (%)";

/// Lenient numeric parse used for dataset cells.
///
/// Surrounding whitespace and thousands separators are ignored; anything else
/// that is not a finite number yields `None`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

//
// ================= Customer =================
//

/// One row of the customer dataset, keyed by mobile number.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerRecord {
    pub mobile_number: String,
    /// Raw cell text; see [`CustomerRecord::cibil_score`]
    pub cibil_score_raw: String,
    /// Remaining columns, untouched
    pub profile: BTreeMap<String, String>,
}

impl CustomerRecord {
    pub fn from_row(mut row: HashMap<String, String>) -> Self {
        let mobile_number = row.remove(MOBILE_NUMBER).unwrap_or_default();
        let cibil_score_raw = row.remove(CIBIL_SCORE).unwrap_or_default();

        Self {
            mobile_number,
            cibil_score_raw,
            profile: row.into_iter().collect(),
        }
    }

    pub fn cibil_score(&self) -> Option<u32> {
        parse_numeric(&self.cibil_score_raw)
            .filter(|v| *v >= 0.0 && *v <= u32::MAX as f64)
            .map(|v| v.trunc() as u32)
    }
}

//
// ================= Bank Offer =================
//

/// One row of the bank offer dataset. Cells are kept as text and parsed on
/// demand so a malformed cell only disqualifies its own offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BankLoanOffer {
    pub bank_name: String,
    pub loan_type: String,
    pub interest_rate: String,
    pub minimum_income: String,
    pub maximum_loan_amount: String,
    pub loan_tenure_years: String,
    pub cibil_score_requirement: String,
    pub processing_fee: String,
    pub prepayment_charges: String,
}

impl BankLoanOffer {
    pub fn from_row(mut row: HashMap<String, String>) -> Self {
        let mut take = |key: &str| row.remove(key).unwrap_or_default().trim().to_string();

        Self {
            bank_name: take(BANK_NAME),
            loan_type: take(LOAN_TYPE),
            interest_rate: take(INTEREST_RATE),
            minimum_income: take(MINIMUM_INCOME),
            maximum_loan_amount: take(MAXIMUM_LOAN_AMOUNT),
            loan_tenure_years: take(LOAN_TENURE),
            cibil_score_requirement: take(CIBIL_REQUIREMENT),
            processing_fee: take(PROCESSING_FEE),
            prepayment_charges: take(PREPAYMENT_CHARGES),
        }
    }

    pub fn interest_rate(&self) -> Option<f64> {
        parse_numeric(&self.interest_rate)
    }

    pub fn minimum_income(&self) -> Option<f64> {
        parse_numeric(&self.minimum_income)
    }

    pub fn maximum_loan_amount(&self) -> Option<f64> {
        parse_numeric(&self.maximum_loan_amount)
    }

    pub fn loan_tenure_years(&self) -> Option<f64> {
        parse_numeric(&self.loan_tenure_years)
    }

    pub fn cibil_score_requirement(&self) -> Option<f64> {
        parse_numeric(&self.cibil_score_requirement)
    }
}

//
// ================= Pending Request =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PendingStep {
    AwaitingMobile,
}

/// Loan parameters parsed out of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoanParameters {
    pub loan_amount: u64,
    pub duration_years: u32,
    pub income: u64,
}

/// Loan parameters captured from a user, waiting on their mobile number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingLoanRequest {
    pub loan_amount: u64,
    pub duration_years: u32,
    pub income: u64,
    pub step: PendingStep,
    pub created_at: DateTime<Utc>,
}

impl PendingLoanRequest {
    pub fn awaiting_mobile(params: LoanParameters) -> Self {
        Self {
            loan_amount: params.loan_amount,
            duration_years: params.duration_years,
            income: params.income,
            step: PendingStep::AwaitingMobile,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

impl fmt::Display for PendingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PendingStep::AwaitingMobile => "awaiting_mobile",
        };
        write!(f, "{}", s)
    }
}
