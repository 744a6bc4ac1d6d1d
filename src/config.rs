//! Runtime settings
//!
//! Read from the process environment (after `.env` is loaded) with defaults
//! that match a local single-node deployment.

use crate::error::LoanAdvisorError;
use crate::memory::MemoryScope;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_CUSTOMER_DATA: &str = "Customer Loan Data.csv";
pub const DEFAULT_BANK_LOAN_DATA: &str = "Bank Loan Suggestion.csv";
pub const DEFAULT_USER_ID: &str = "defaultUser";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub customer_data_path: PathBuf,
    pub bank_loan_data_path: PathBuf,
    pub pending_request_ttl: Duration,
    pub session_cleanup_interval: Duration,
    /// Per-user transcripts idle longer than this are dropped
    pub memory_idle_ttl: Duration,
    pub generation_timeout: Duration,
    pub dataset_load_timeout: Duration,
    pub history_capacity: usize,
    pub memory_scope: MemoryScope,
    /// When false, requests without a `userId` are rejected
    pub allow_anonymous: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_MODEL.to_string(),
            customer_data_path: PathBuf::from(DEFAULT_CUSTOMER_DATA),
            bank_loan_data_path: PathBuf::from(DEFAULT_BANK_LOAN_DATA),
            pending_request_ttl: Duration::from_secs(600),
            session_cleanup_interval: Duration::from_secs(60),
            memory_idle_ttl: Duration::from_secs(3600),
            generation_timeout: Duration::from_secs(30),
            dataset_load_timeout: Duration::from_secs(10),
            history_capacity: 10,
            memory_scope: MemoryScope::Shared,
            allow_anonymous: true,
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read settings from the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        let settings = Self {
            port,
            gemini_api_key: lookup("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            customer_data_path: lookup("CUSTOMER_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.customer_data_path),
            bank_loan_data_path: lookup("BANK_LOAN_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bank_loan_data_path),
            pending_request_ttl: seconds(&lookup, "PENDING_REQUEST_TTL_SECS", defaults.pending_request_ttl)?,
            session_cleanup_interval: seconds(
                &lookup,
                "SESSION_CLEANUP_INTERVAL_SECS",
                defaults.session_cleanup_interval,
            )?,
            memory_idle_ttl: seconds(&lookup, "MEMORY_IDLE_TTL_SECS", defaults.memory_idle_ttl)?,
            generation_timeout: seconds(&lookup, "GENERATION_TIMEOUT_SECS", defaults.generation_timeout)?,
            dataset_load_timeout: seconds(&lookup, "DATASET_LOAD_TIMEOUT_SECS", defaults.dataset_load_timeout)?,
            history_capacity: match lookup("HISTORY_CAPACITY") {
                Some(raw) => parse_value("HISTORY_CAPACITY", &raw)?,
                None => defaults.history_capacity,
            },
            memory_scope: match lookup("MEMORY_SCOPE") {
                Some(raw) => raw.parse()?,
                None => defaults.memory_scope,
            },
            allow_anonymous: match lookup("ALLOW_ANONYMOUS") {
                Some(raw) => parse_flag("ALLOW_ANONYMOUS", &raw)?,
                None => defaults.allow_anonymous,
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        // turns are stored as (user, bot) pairs
        if self.history_capacity == 0 || self.history_capacity % 2 != 0 {
            return Err(LoanAdvisorError::Config(
                "HISTORY_CAPACITY must be a positive even number".to_string(),
            ));
        }

        let durations = [
            ("PENDING_REQUEST_TTL_SECS", self.pending_request_ttl),
            ("SESSION_CLEANUP_INTERVAL_SECS", self.session_cleanup_interval),
            ("MEMORY_IDLE_TTL_SECS", self.memory_idle_ttl),
            ("GENERATION_TIMEOUT_SECS", self.generation_timeout),
            ("DATASET_LOAD_TIMEOUT_SECS", self.dataset_load_timeout),
        ];

        for (field, value) in durations {
            if value.is_zero() {
                return Err(LoanAdvisorError::Config(format!(
                    "{} must be greater than zero",
                    field
                )));
            }
        }

        Ok(())
    }

    /// User id applied to requests that carry none
    pub fn default_user(&self) -> Option<String> {
        self.allow_anonymous.then(|| DEFAULT_USER_ID.to_string())
    }
}

fn parse_value<T: FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        LoanAdvisorError::Config(format!("{} has an invalid value: {:?}", field, raw))
    })
}

fn seconds<F>(lookup: &F, field: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(field) {
        Some(raw) => parse_value::<u64>(field, &raw).map(Duration::from_secs),
        None => Ok(default),
    }
}

fn parse_flag(field: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoanAdvisorError::Config(format!(
            "{} must be a boolean, got {:?}",
            field, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.history_capacity, 10);
        assert_eq!(settings.memory_scope, MemoryScope::Shared);
        assert_eq!(settings.default_user().as_deref(), Some("defaultUser"));
        assert_eq!(
            settings.customer_data_path,
            PathBuf::from("Customer Loan Data.csv")
        );
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("API_PORT", "8080"),
            ("MEMORY_SCOPE", "per_user"),
            ("ALLOW_ANONYMOUS", "false"),
            ("PENDING_REQUEST_TTL_SECS", "30"),
            ("MEMORY_IDLE_TTL_SECS", "900"),
            ("HISTORY_CAPACITY", "20"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.memory_scope, MemoryScope::PerUser);
        assert_eq!(settings.default_user(), None);
        assert_eq!(settings.pending_request_ttl, Duration::from_secs(30));
        assert_eq!(settings.memory_idle_ttl, Duration::from_secs(900));
        assert_eq!(settings.history_capacity, 20);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_lookup(lookup(&[("PORT", "abc")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("HISTORY_CAPACITY", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("HISTORY_CAPACITY", "3")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("MEMORY_IDLE_TTL_SECS", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("GENERATION_TIMEOUT_SECS", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("MEMORY_SCOPE", "global")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("ALLOW_ANONYMOUS", "maybe")])).is_err());
    }
}
