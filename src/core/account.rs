//! Account business logic - Account lifecycle and account lookups.
//!
//! Accounts are created at user setup (one `cash`, one `bank`) or added later as extra
//! bank accounts. Their balances are only ever moved by the operations in
//! [`crate::core::transaction`]; this module handles naming, creation and removal.

use crate::{
    core::{
        Ledger, Session,
        balances::write_name,
        projection::{ChangeKind, LedgerChange},
        retry::with_retry,
    },
    entities::{Account, Transaction, UserProfile, account, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Condition, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info, instrument};
use uuid::Uuid;

/// Fixed id of the cash account created at setup.
pub const CASH_ACCOUNT_ID: &str = "cash";
/// Fixed id of the default bank account created at setup.
pub const BANK_ACCOUNT_ID: &str = "bank";

/// Stored account type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// The single `cash` account created at setup
    Cash,
    /// The default bank account and every account added later
    Bank,
}

impl AccountType {
    /// Tag stored in the `account_type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            other => Err(Error::corrupt(format!("unknown account type '{other}'"))),
        }
    }
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid("account name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Builds a new account row. Shared with user setup.
pub(crate) fn new_account_row(
    session: &Session,
    id: &str,
    name: String,
    account_type: AccountType,
    initial_balance: Decimal,
) -> account::ActiveModel {
    account::ActiveModel {
        user_id: Set(session.user_id().to_string()),
        id: Set(id.to_string()),
        name: Set(name),
        account_type: Set(account_type.as_str().to_string()),
        balance: Set(initial_balance),
        initial_balance: Set(initial_balance),
        version: Set(0),
        created_at: Set(Utc::now()),
    }
}

/// Retrieves all of the user's accounts in the order they were opened.
pub async fn list_accounts<C>(db: &C, session: &Session) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find()
        .filter(account::Column::UserId.eq(session.user_id()))
        .order_by_asc(account::Column::CreatedAt)
        .order_by_asc(account::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds one account by id, returning None if it does not exist.
pub async fn get_account(
    ledger: &Ledger,
    session: &Session,
    account_id: &str,
) -> Result<Option<account::Model>> {
    Account::find_by_id((session.user_id().to_string(), account_id.to_string()))
        .one(ledger.database())
        .await
        .map_err(Into::into)
}

/// Opens an additional bank account. No event is recorded; the account simply starts at
/// `initial_balance`.
///
/// # Errors
/// * `InvalidInput` - blank name or negative opening balance
/// * `NotFound` - the user has not been initialized
#[instrument(skip(ledger, session), fields(user = session.user_id()))]
pub async fn add_account(
    ledger: &Ledger,
    session: &Session,
    name: &str,
    initial_balance: Decimal,
) -> Result<account::Model> {
    let name = clean_name(name)?;
    if initial_balance < Decimal::ZERO {
        return Err(Error::invalid(format!(
            "opening balance cannot be negative, got {initial_balance}"
        )));
    }

    let txn = ledger.database().begin().await?;

    UserProfile::find_by_id(session.user_id().to_string())
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", session.user_id()))?;

    let id = Uuid::new_v4().to_string();
    let row = new_account_row(session, &id, name, AccountType::Bank, initial_balance);
    Account::insert(row).exec_without_returning(&txn).await?;
    let created = Account::find_by_id((session.user_id().to_string(), id.clone()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("account", &id))?;

    txn.commit().await?;

    info!(account = %created.id, name = %created.name, balance = %created.balance, "Account added");
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::AccountCreated { id: created.id.clone() },
    ));
    Ok(created)
}

/// Renames an account and the account name copied onto its income and expense events.
///
/// Transfer and peer-transfer events keep the names they were recorded with.
///
/// # Errors
/// * `InvalidInput` - blank name
/// * `NotFound` - the account does not exist
#[instrument(skip(ledger, session), fields(user = session.user_id()))]
pub async fn rename_account(
    ledger: &Ledger,
    session: &Session,
    account_id: &str,
    new_name: &str,
) -> Result<account::Model> {
    let new_name = clean_name(new_name)?;
    let new_name = new_name.as_str();

    let renamed = with_retry(ledger.retry_policy(), "rename_account", move || {
        try_rename_account(ledger.database(), session, account_id, new_name)
    })
    .await?;

    info!(account = account_id, name = new_name, "Account renamed");
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::AccountUpdated { id: renamed.id.clone() },
    ));
    Ok(renamed)
}

async fn try_rename_account(
    db: &DatabaseConnection,
    session: &Session,
    account_id: &str,
    new_name: &str,
) -> Result<account::Model> {
    let txn = db.begin().await?;

    let current = Account::find_by_id((session.user_id().to_string(), account_id.to_string()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("account", account_id))?;
    let renamed = write_name(&txn, &current, new_name).await?;

    Transaction::update_many()
        .col_expr(transaction::Column::AccountName, Expr::value(new_name))
        .filter(transaction::Column::UserId.eq(session.user_id()))
        .filter(transaction::Column::AccountId.eq(account_id))
        .filter(transaction::Column::Kind.is_in(["income", "expense"]))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(renamed)
}

/// Counts events that reference an account in any role.
pub async fn count_references<C>(db: &C, session: &Session, account_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(session.user_id()))
        .filter(
            Condition::any()
                .add(transaction::Column::AccountId.eq(account_id))
                .add(transaction::Column::FromAccountId.eq(account_id))
                .add(transaction::Column::ToAccountId.eq(account_id)),
        )
        .count(db)
        .await
        .map_err(Into::into)
}

/// Removes an account that no event references.
///
/// The cash account and the default bank account are permanent.
///
/// # Errors
/// * `InvalidInput` - the account is one of the two defaults
/// * `NotFound` - the account does not exist
/// * `HasTransactions` - at least one event still references the account
#[instrument(skip(ledger, session), fields(user = session.user_id()))]
pub async fn delete_account(ledger: &Ledger, session: &Session, account_id: &str) -> Result<()> {
    if account_id == CASH_ACCOUNT_ID || account_id == BANK_ACCOUNT_ID {
        return Err(Error::invalid(format!(
            "the default '{account_id}' account cannot be deleted"
        )));
    }

    with_retry(ledger.retry_policy(), "delete_account", move || {
        try_delete_account(ledger.database(), session, account_id)
    })
    .await?;

    info!(account = account_id, "Account deleted");
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::AccountDeleted {
            id: account_id.to_string(),
        },
    ));
    Ok(())
}

async fn try_delete_account(
    db: &DatabaseConnection,
    session: &Session,
    account_id: &str,
) -> Result<()> {
    let txn = db.begin().await?;

    let current = Account::find_by_id((session.user_id().to_string(), account_id.to_string()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("account", account_id))?;

    if current.account_type.parse::<AccountType>()? == AccountType::Cash {
        return Err(Error::invalid("the cash account cannot be deleted"));
    }

    let count = count_references(&txn, session, account_id).await?;
    if count > 0 {
        return Err(Error::HasTransactions {
            account: current.name,
            count,
        });
    }

    let result = Account::delete_many()
        .filter(account::Column::UserId.eq(session.user_id()))
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::Version.eq(current.version))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            resource: account_id.to_string(),
        });
    }

    txn.commit().await?;
    Ok(())
}
