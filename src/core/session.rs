//! Ledger handle and per-user session.
//!
//! A [`Ledger`] owns everything the operations need that is not user specific: the
//! store connection, the retry policy, the setup defaults and the change feed. A
//! [`Session`] names the user every call is scoped to. Both are passed explicitly to
//! each operation; there is no ambient state.

use crate::{
    config::app::AppConfig,
    core::{
        projection::{LedgerChange, Subscription},
        retry::RetryPolicy,
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;

const CHANGE_FEED_CAPACITY: usize = 256;

/// Shared ledger context.
///
/// Cheap to share by reference across tasks; the underlying connection is a pool.
#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    retry: RetryPolicy,
    config: AppConfig,
    changes: broadcast::Sender<LedgerChange>,
}

impl Ledger {
    /// Creates a ledger over an already prepared database (see
    /// [`crate::config::database::create_tables`]).
    #[must_use]
    pub fn new(database: DatabaseConnection, config: AppConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            database,
            retry: RetryPolicy::from(&config.retry),
            config,
            changes,
        }
    }

    /// Connection pool every operation runs against.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    /// Retry policy applied to conflicting writes.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Configuration the ledger was created with.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Subscribes to committed changes for one user.
    #[must_use]
    pub fn subscribe(&self, session: &Session) -> Subscription {
        Subscription::new(session.user_id().to_string(), self.changes.subscribe())
    }

    /// Announces a committed change. Called only after the store commit succeeded.
    pub(crate) fn publish(&self, change: LedgerChange) {
        if self.changes.send(change).is_err() {
            tracing::trace!("No change subscribers");
        }
    }
}

/// The user a ledger call acts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    user_id: String,
}

impl Session {
    /// Creates a session for an authenticated user id.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the id is blank.
    pub fn new(user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::invalid("user id cannot be empty"));
        }
        Ok(Self { user_id })
    }

    /// Id of the user this session acts for.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
