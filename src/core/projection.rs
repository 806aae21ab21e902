//! Read projection - what the interface layer renders.
//!
//! The projection never writes. A [`Snapshot`] is read inside one database transaction so
//! accounts and events always agree with each other. After every committed mutation the
//! ledger publishes a [`LedgerChange`]; a [`Subscription`] filters the feed down to one
//! user, and subscribers re-read the snapshot when told something changed.

use crate::{
    core::{
        Ledger, Session, account::list_accounts, event::LedgerEvent,
        transaction::list_transactions,
    },
    entities::{Category, account, category},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

/// What changed in a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Setup completed
    UserInitialized,
    /// An account was added
    AccountCreated {
        /// Account id
        id: String,
    },
    /// An account was renamed
    AccountUpdated {
        /// Account id
        id: String,
    },
    /// An account was removed
    AccountDeleted {
        /// Account id
        id: String,
    },
    /// An event was recorded
    TransactionCreated {
        /// Event id
        id: String,
    },
    /// An event was edited
    TransactionUpdated {
        /// Event id
        id: String,
    },
    /// An event was deleted
    TransactionDeleted {
        /// Event id
        id: String,
    },
    /// Changes were missed; re-read everything
    Resync,
}

/// One committed mutation, as announced on the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerChange {
    /// User whose ledger changed
    pub user_id: String,
    /// What changed
    pub kind: ChangeKind,
}

impl LedgerChange {
    /// Change to the session user's ledger.
    #[must_use]
    pub fn new(session: &Session, kind: ChangeKind) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            kind,
        }
    }
}

/// A user's view of the change feed.
#[derive(Debug)]
pub struct Subscription {
    user_id: String,
    receiver: broadcast::Receiver<LedgerChange>,
}

impl Subscription {
    pub(crate) const fn new(user_id: String, receiver: broadcast::Receiver<LedgerChange>) -> Self {
        Self { user_id, receiver }
    }

    /// Waits for the next change to this user's ledger.
    ///
    /// Returns `None` once the ledger has been dropped. A subscriber that fell behind gets
    /// a single [`ChangeKind::Resync`] instead of the changes it missed.
    pub async fn next_change(&mut self) -> Option<LedgerChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.user_id == self.user_id => return Some(change),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(user = %self.user_id, skipped, "Subscriber lagged");
                    return Some(LedgerChange {
                        user_id: self.user_id.clone(),
                        kind: ChangeKind::Resync,
                    });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Ordered category labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Categories {
    /// Income labels in display order
    pub income: Vec<String>,
    /// Expense labels in display order
    pub expense: Vec<String>,
}

/// Consistent view of one user's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Accounts in the order they were opened
    pub accounts: Vec<account::Model>,
    /// Newest first by ordering key
    pub transactions: Vec<LedgerEvent>,
    /// The user's category lists
    pub categories: Categories,
}

impl Snapshot {
    /// Sum of all account balances (the dashboard's headline figure).
    #[must_use]
    pub fn total_balance(&self) -> Decimal {
        self.accounts.iter().map(|account| account.balance).sum()
    }
}

/// Reads accounts, events and categories in one transaction.
pub async fn snapshot(ledger: &Ledger, session: &Session) -> Result<Snapshot> {
    let txn = ledger.database().begin().await?;

    let accounts = list_accounts(&txn, session).await?;
    let transactions = list_transactions(&txn, session).await?;
    let categories = load_categories(&txn, session).await?;

    txn.commit().await?;
    Ok(Snapshot {
        accounts,
        transactions,
        categories,
    })
}

async fn load_categories<C>(db: &C, session: &Session) -> Result<Categories>
where
    C: ConnectionTrait,
{
    let rows = Category::find()
        .filter(category::Column::UserId.eq(session.user_id()))
        .order_by_asc(category::Column::Kind)
        .order_by_asc(category::Column::Position)
        .all(db)
        .await?;

    let mut categories = Categories::default();
    for row in rows {
        match row.kind.as_str() {
            "income" => categories.income.push(row.label),
            "expense" => categories.expense.push(row.label),
            other => tracing::warn!(kind = other, "Ignoring unknown category kind"),
        }
    }
    Ok(categories)
}

/// Result of checking one account against its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAudit {
    /// Audited account
    pub account_id: String,
    /// Account display name
    pub name: String,
    /// Balance stored on the account
    pub recorded: Decimal,
    /// Opening balance plus the effect of every live event
    pub expected: Decimal,
}

impl AccountAudit {
    /// Whether the stored balance matches the event log.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.recorded == self.expected
    }
}

/// Recomputes every account balance from its opening balance and the event log.
pub async fn audit(ledger: &Ledger, session: &Session) -> Result<Vec<AccountAudit>> {
    let view = snapshot(ledger, session).await?;

    Ok(view
        .accounts
        .iter()
        .map(|account| {
            let net: Decimal = view
                .transactions
                .iter()
                .map(|event| event.body.effect_on(&account.id))
                .sum();
            AccountAudit {
                account_id: account.id.clone(),
                name: account.name.clone(),
                recorded: account.balance,
                expected: account.initial_balance + net,
            }
        })
        .collect())
}
