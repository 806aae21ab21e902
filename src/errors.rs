//! Unified error types for the ledger core.
//!
//! Every ledger operation returns [`Result`]. Validation failures are raised before the
//! store is touched; store failures abort the surrounding database transaction, so an
//! error always means nothing was written.

use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure a ledger operation can report.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced account, event or user profile does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// `"account"`, `"transaction"` or `"user"`
        entity: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// A transfer or peer transfer would take the source account below zero.
    #[error("Insufficient funds in '{account}': available {available}, required {required}")]
    InsufficientFunds {
        /// Source account name
        account: String,
        /// Balance at the time of the check
        available: Decimal,
        /// Amount the operation needed
        required: Decimal,
    },

    /// A request failed validation before the store was touched.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the request
        message: String,
    },

    /// The account is still referenced by at least one event.
    #[error("Account '{account}' still has {count} transaction(s)")]
    HasTransactions {
        /// Account name
        account: String,
        /// Events referencing the account in any role
        count: u64,
    },

    /// A compare-and-swap write lost against a concurrent writer.
    #[error("Concurrent update detected on '{resource}'")]
    Conflict {
        /// Account id, or `<user>/sequence` for the ordering key
        resource: String,
    },

    /// Every attempt allowed by the retry policy lost a concurrent write.
    #[error("Operation '{operation}' gave up after {attempts} conflicting attempt(s)")]
    ConflictRetryExhausted {
        /// Name of the ledger operation
        operation: &'static str,
        /// Attempts made, including the first
        attempts: u32,
    },

    /// Setup already ran for this user.
    #[error("User '{user}' is already initialized")]
    AlreadyInitialized {
        /// User id
        user: String,
    },

    /// A stored row could not be decoded into a ledger value.
    #[error("Corrupt record: {message}")]
    CorruptRecord {
        /// Which row and column failed to decode
        message: String,
    },

    /// config.toml could not be read, parsed or validated.
    #[error("Configuration error: {message}")]
    Config {
        /// Failure description, including the file path when known
        message: String,
    },

    /// Store failure reported by `SeaORM`.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure, e.g. creating the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }

    /// Whether the caller may simply retry the same request later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::ConflictRetryExhausted { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
