//! Shared test utilities for the ledger core.
//!
//! This module provides common helper functions for setting up test databases, initialized
//! users and request values with sensible defaults.

use crate::{
    config::app::AppConfig,
    core::{
        Ledger, Session,
        account::add_account,
        event::{EntryType, NewPeerTransfer, NewTransaction, NewTransfer},
        projection::audit,
        setup::{NewUser, OpeningBalances, initialize_user},
    },
    entities::{Account, account},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, DatabaseConnection, prelude::*, sea_query::Expr};

/// User id used by single-user tests.
pub const TEST_USER: &str = "test_user";

/// Opens an in-memory `SQLite` database with all tables created.
///
/// The pool is pinned to one connection: every connection to `sqlite::memory:` is a
/// separate database, and concurrent tests must share one.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Wraps a connection (real or mocked) in a ledger with fast retries.
#[must_use]
pub fn ledger_over(db: DatabaseConnection) -> Ledger {
    ledger_over_with(db, AppConfig::default())
}

fn ledger_over_with(db: DatabaseConnection, mut config: AppConfig) -> Ledger {
    config.retry.base_delay_ms = 0;
    Ledger::new(db, config)
}

/// Ledger over a fresh in-memory database with default configuration.
pub async fn setup_test_ledger() -> Result<Ledger> {
    setup_test_ledger_with(AppConfig::default()).await
}

/// Ledger over a fresh in-memory database with the given configuration.
pub async fn setup_test_ledger_with(config: AppConfig) -> Result<Ledger> {
    Ok(ledger_over_with(setup_test_db().await?, config))
}

/// Session for [`TEST_USER`].
///
/// # Panics
/// Never; the id is a non-empty constant.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_session() -> Session {
    Session::new(TEST_USER).unwrap()
}

/// Initializes another user on an existing ledger.
pub async fn initialize_test_user(
    ledger: &Ledger,
    user_id: &str,
    cash: i64,
    bank: i64,
) -> Result<Session> {
    let session = Session::new(user_id)?;
    initialize_user(
        ledger,
        &session,
        NewUser::default(),
        OpeningBalances {
            cash: Decimal::from(cash),
            bank: Decimal::from(bank),
        },
    )
    .await?;
    Ok(session)
}

/// Sets up a ledger with [`TEST_USER`] initialized to the given opening balances.
/// Returns (ledger, session) for common test scenarios.
pub async fn setup_initialized_user(cash: i64, bank: i64) -> Result<(Ledger, Session)> {
    let ledger = setup_test_ledger().await?;
    let session = initialize_test_user(&ledger, TEST_USER, cash, bank).await?;
    Ok((ledger, session))
}

/// Opens an extra bank account.
pub async fn add_test_account(
    ledger: &Ledger,
    session: &Session,
    name: &str,
    initial_balance: i64,
) -> Result<account::Model> {
    add_account(ledger, session, name, Decimal::from(initial_balance)).await
}

/// A date safely in the past.
#[must_use]
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap_or_default()
}

/// Income or expense request.
///
/// # Defaults
/// * `category`: `"Food"`
/// * `date`: [`test_date`]
/// * `description`: None
#[must_use]
pub fn entry_request(account_id: &str, entry_type: EntryType, amount: i64) -> NewTransaction {
    NewTransaction {
        account_id: account_id.to_string(),
        entry_type,
        amount: Decimal::from(amount),
        category: "Food".to_string(),
        date: test_date(),
        description: None,
    }
}

/// Transfer request dated [`test_date`] with no description.
#[must_use]
pub fn transfer_request(from: &str, to: &str, amount: i64) -> NewTransfer {
    NewTransfer {
        from_account_id: from.to_string(),
        to_account_id: to.to_string(),
        amount: Decimal::from(amount),
        date: test_date(),
        description: None,
    }
}

/// Peer-transfer request dated [`test_date`] with no description.
#[must_use]
pub fn peer_request(account_id: &str, amount: i64, recipient: &str) -> NewPeerTransfer {
    NewPeerTransfer {
        account_id: account_id.to_string(),
        amount: Decimal::from(amount),
        recipient: recipient.to_string(),
        date: test_date(),
        description: None,
    }
}

/// Current stored balance of an account.
pub async fn balance_of(ledger: &Ledger, session: &Session, account_id: &str) -> Result<Decimal> {
    Account::find_by_id((session.user_id().to_string(), account_id.to_string()))
        .one(ledger.database())
        .await?
        .map(|account| account.balance)
        .ok_or_else(|| Error::not_found("account", account_id))
}

/// Fails unless every account balance equals its opening balance plus its events.
pub async fn assert_invariant(ledger: &Ledger, session: &Session) -> Result<()> {
    for account in audit(ledger, session).await? {
        assert!(
            account.is_consistent(),
            "account {} records {} but its events add up to {}",
            account.account_id,
            account.recorded,
            account.expected
        );
    }
    Ok(())
}

/// Removes an account row directly, bypassing the reference check, to simulate an
/// account that disappeared while events still point at it.
pub async fn remove_account_row(ledger: &Ledger, session: &Session, account_id: &str) -> Result<()> {
    Account::delete_by_id((session.user_id().to_string(), account_id.to_string()))
        .exec(ledger.database())
        .await?;
    Ok(())
}

/// Writes a balance directly, bypassing the ledger.
pub async fn overwrite_balance(
    ledger: &Ledger,
    session: &Session,
    account_id: &str,
    balance: Decimal,
) -> Result<()> {
    Account::update_many()
        .col_expr(account::Column::Balance, Expr::value(balance))
        .filter(account::Column::UserId.eq(session.user_id()))
        .filter(account::Column::Id.eq(account_id))
        .exec(ledger.database())
        .await?;
    Ok(())
}
