//! Application configuration loading from config.toml
//!
//! Every section is optional. A missing file, a missing section or a missing key falls
//! back to the defaults the ledger ships with, so a fresh checkout runs without any
//! configuration at all.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Optimistic-concurrency retry settings
    pub retry: RetryConfig,
    /// Names given to the two accounts created at user setup
    pub defaults: DefaultAccounts,
    /// Category lists written at user setup
    pub categories: CategoryConfig,
}

/// Bounded retry settings for conflicting account writes
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first one
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles on each further attempt
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
        }
    }
}

/// Names of the two accounts every user starts with
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultAccounts {
    /// Display name of the `cash` account
    pub cash_name: String,
    /// Display name of the default `bank` account
    pub bank_name: String,
}

impl Default for DefaultAccounts {
    fn default() -> Self {
        Self {
            cash_name: "Cash in Hand".to_string(),
            bank_name: "Bank Account".to_string(),
        }
    }
}

/// Ordered income and expense category labels
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CategoryConfig {
    /// Labels offered for income, in display order
    pub income: Vec<String>,
    /// Labels offered for expenses, in display order
    pub expense: Vec<String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        let labels = |items: &[&str]| items.iter().map(ToString::to_string).collect();
        Self {
            income: labels(&["Salary", "Business", "Investment Return", "Gift"]),
            expense: labels(&[
                "Food",
                "Kirana",
                "Milk",
                "Subscriptions",
                "Shopping",
                "Transport",
                "Bills",
                "Health",
                "Gifts",
                "Peer Transfer",
            ]),
        }
    }
}

/// Loads application configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A retry setting is zero
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if config.retry.max_attempts == 0 {
        return Err(Error::Config {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }

    Ok(config)
}

/// Loads configuration from the default location (./config.toml), falling back to the
/// built-in defaults when the file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config.toml found, using built-in defaults");
        Ok(AppConfig::default())
    }
}
