//! Dataset loading
//!
//! Reads the customer and bank offer CSV files once at startup. A missing or
//! unreadable file leaves its collection empty instead of failing startup.

use crate::error::LoanAdvisorError;
use crate::models::{BankLoanOffer, CustomerRecord};
use crate::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Read-only in-memory view of both datasets
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub customers: Vec<CustomerRecord>,
    /// Shared with the loan matcher
    pub offers: Arc<Vec<BankLoanOffer>>,
}

/// Outcome of looking a customer up by mobile number
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerLookup<'a> {
    /// Customer dataset is empty (failed to load or has no rows)
    Unavailable,
    NotFound,
    Found(&'a CustomerRecord),
}

impl Datasets {
    pub fn new(customers: Vec<CustomerRecord>, offers: Vec<BankLoanOffer>) -> Self {
        Self {
            customers,
            offers: Arc::new(offers),
        }
    }

    /// Load both files. Failures are logged and yield empty collections.
    pub fn load(customer_path: &Path, bank_path: &Path) -> Self {
        let customers = match load_customers(customer_path) {
            Ok(rows) => {
                info!("Customer loan data loaded successfully ({} rows)", rows.len());
                rows
            }
            Err(e) => {
                error!("Customer data unavailable from {}: {}", customer_path.display(), e);
                Vec::new()
            }
        };

        let offers = match load_offers(bank_path) {
            Ok(rows) => {
                info!("Bank loan suggestion data loaded successfully ({} rows)", rows.len());
                rows
            }
            Err(e) => {
                error!("Bank loan data unavailable from {}: {}", bank_path.display(), e);
                Vec::new()
            }
        };

        Self::new(customers, offers)
    }

    /// Load on the blocking pool, giving up after `limit`
    pub async fn load_with_timeout(
        customer_path: &Path,
        bank_path: &Path,
        limit: Duration,
    ) -> Self {
        let customer_path = customer_path.to_path_buf();
        let bank_path = bank_path.to_path_buf();

        let task = tokio::task::spawn_blocking(move || Self::load(&customer_path, &bank_path));

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(datasets)) => datasets,
            Ok(Err(e)) => {
                error!("Dataset load task failed: {}", e);
                Self::default()
            }
            Err(_) => {
                error!("Dataset load exceeded {:?}; continuing with empty datasets", limit);
                Self::default()
            }
        }
    }

    /// Exact match on the mobile number column
    pub fn find_customer(&self, mobile_number: &str) -> CustomerLookup<'_> {
        if self.customers.is_empty() {
            return CustomerLookup::Unavailable;
        }

        self.customers
            .iter()
            .find(|c| c.mobile_number == mobile_number)
            .map(CustomerLookup::Found)
            .unwrap_or(CustomerLookup::NotFound)
    }
}

pub fn load_customers(path: &Path) -> Result<Vec<CustomerRecord>> {
    Ok(read_rows(path)?
        .into_iter()
        .map(CustomerRecord::from_row)
        .collect())
}

pub fn load_offers(path: &Path) -> Result<Vec<BankLoanOffer>> {
    Ok(read_rows(path)?
        .into_iter()
        .map(BankLoanOffer::from_row)
        .collect())
}

/// Read a headed CSV file into header→cell maps, skipping unreadable rows
fn read_rows(path: &Path) -> Result<Vec<HashMap<String, String>>> {
    if !path.exists() {
        return Err(LoanAdvisorError::Dataset(format!(
            "{} not found",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let row = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect();
                rows.push(row);
            }
            Err(e) => {
                warn!("Skipping row {} of {}: {}", index + 1, path.display(), e);
            }
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const BANK_CSV: &str = "Bank Name,Loan Type,Interest Rate (%),Minimum Income Required (INR),Maximum Loan Amount (INR),Loan Tenure (years),CIBIL Score Requirement,Processing Fee (%),Prepayment Charges (%)\n\
HDFC,Personal,10.5,30000,1500000,5,720,1.5,2\n\
SBI,Home,8.5,50000,600000,10,700,0.5,0\n";

    #[test]
    fn test_load_offers() {
        let file = csv_file(BANK_CSV);
        let offers = load_offers(file.path()).unwrap();

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[1].bank_name, "SBI");
        assert_eq!(offers[1].interest_rate(), Some(8.5));
        assert_eq!(offers[0].cibil_score_requirement(), Some(720.0));
    }

    #[test]
    fn test_non_numeric_cells_do_not_fail_load() {
        let file = csv_file("mobile_number,cibil_score,name\n9999999999,750,Asha\n8888888888,pending,Ravi\n");
        let customers = load_customers(file.path()).unwrap();

        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].cibil_score(), Some(750));
        assert_eq!(customers[1].cibil_score(), None);
    }

    #[test]
    fn test_missing_files_leave_empty_collections() {
        let datasets = Datasets::load(
            Path::new("/nonexistent/customers.csv"),
            Path::new("/nonexistent/banks.csv"),
        );

        assert!(datasets.customers.is_empty());
        assert!(datasets.offers.is_empty());
        assert_eq!(datasets.find_customer("9999999999"), CustomerLookup::Unavailable);
    }

    #[test]
    fn test_find_customer_exact_match() {
        let file = csv_file("mobile_number,cibil_score\n9999999999,750\n");
        let datasets = Datasets::new(load_customers(file.path()).unwrap(), vec![]);

        assert!(matches!(
            datasets.find_customer("9999999999"),
            CustomerLookup::Found(c) if c.cibil_score() == Some(750)
        ));
        assert_eq!(datasets.find_customer(" 9999999999"), CustomerLookup::NotFound);
        assert_eq!(datasets.find_customer("0000000000"), CustomerLookup::NotFound);
    }

    #[tokio::test]
    async fn test_load_with_timeout() {
        let customers = csv_file("mobile_number,cibil_score\n1,700\n");
        let banks = csv_file(BANK_CSV);

        let datasets = Datasets::load_with_timeout(
            customers.path(),
            banks.path(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(datasets.customers.len(), 1);
        assert_eq!(datasets.offers.len(), 2);
    }
}
