//! Loan matching engine
//!
//! Deterministic: filters bank offers against the applicant's numbers and
//! ranks what survives by interest rate. No LLM involvement.

use crate::models::BankLoanOffer;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Minimum CIBIL score for any loan recommendation
pub const MIN_CIBIL_SCORE: u32 = 700;

/// Maximum offers returned per suggestion
pub const MAX_SUGGESTIONS: usize = 3;

/// Result of a loan suggestion. Every variant is a valid business outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum LoanSuggestion {
    /// No bank offers are loaded
    Unavailable,
    /// Score missing or below [`MIN_CIBIL_SCORE`]
    Ineligible,
    /// Score is fine but no offer fits the request
    NoMatch,
    /// Up to [`MAX_SUGGESTIONS`] offers, cheapest first
    Offers {
        cibil_score: u32,
        offers: Vec<BankLoanOffer>,
    },
}

pub struct LoanMatcher {
    offers: Arc<Vec<BankLoanOffer>>,
}

impl LoanMatcher {
    pub fn new(offers: Arc<Vec<BankLoanOffer>>) -> Self {
        Self { offers }
    }

    pub fn suggest(
        &self,
        loan_amount: u64,
        income: u64,
        duration_years: u32,
        cibil_score: Option<u32>,
    ) -> LoanSuggestion {
        if self.offers.is_empty() {
            return LoanSuggestion::Unavailable;
        }

        let cibil_score = match cibil_score {
            Some(score) if score >= MIN_CIBIL_SCORE => score,
            _ => return LoanSuggestion::Ineligible,
        };

        let loan_amount = loan_amount as f64;
        let income = income as f64;
        let duration_years = duration_years as f64;
        let score = cibil_score as f64;

        let mut suitable: Vec<&BankLoanOffer> = self
            .offers
            .iter()
            .filter(|offer| {
                offer.minimum_income().is_some_and(|min| income >= min)
                    && offer.maximum_loan_amount().is_some_and(|max| loan_amount <= max)
                    && offer.loan_tenure_years().is_some_and(|tenure| tenure >= duration_years)
                    && offer.cibil_score_requirement().is_some_and(|req| score >= req)
            })
            .collect();

        // Vec::sort_by is stable, so equal rates keep dataset order
        suitable.sort_by(|a, b| compare_rates(a.interest_rate(), b.interest_rate()));
        suitable.truncate(MAX_SUGGESTIONS);

        if suitable.is_empty() {
            return LoanSuggestion::NoMatch;
        }

        LoanSuggestion::Offers {
            cibil_score,
            offers: suitable.into_iter().cloned().collect(),
        }
    }
}

/// Unparsable rates sort after every parsed one
fn compare_rates(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Format an amount with comma thousands separators (600000 -> "600,000")
pub fn group_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let digits = format!("{}", value.abs().trunc() as u64);

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

impl fmt::Display for LoanSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanSuggestion::Unavailable => {
                write!(f, "Sorry, bank loan data is not available at the moment.")
            }
            LoanSuggestion::Ineligible => write!(
                f,
                "Sorry, you are not eligible for a loan at this time. A minimum CIBIL score of {} is required.",
                MIN_CIBIL_SCORE
            ),
            LoanSuggestion::NoMatch => write!(
                f,
                "Sorry, we couldn't find a suitable loan option for your profile despite your eligible CIBIL score."
            ),
            LoanSuggestion::Offers { cibil_score, offers } => {
                writeln!(
                    f,
                    "Congratulations! You are eligible for a loan with your CIBIL score of {}. Here are some recommended options:",
                    cibil_score
                )?;

                for (index, offer) in offers.iter().enumerate() {
                    let max_amount = offer
                        .maximum_loan_amount()
                        .map(group_thousands)
                        .unwrap_or_else(|| offer.maximum_loan_amount.clone());

                    write!(
                        f,
                        "\n**Option {}: {} - {}**\n    - Interest Rate: {}%\n    - Maximum Loan Amount: ₹{}\n    - Tenure: Up to {} years\n    - Processing Fee: {}%\n    - Min. CIBIL Score: {}\n    - Prepayment Charges: {}%\n",
                        index + 1,
                        offer.bank_name,
                        offer.loan_type,
                        offer.interest_rate,
                        max_amount,
                        offer.loan_tenure_years,
                        offer.processing_fee,
                        offer.cibil_score_requirement,
                        offer.prepayment_charges,
                    )?;
                }

                Ok(())
            }
        }
    }
}
