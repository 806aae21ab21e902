//! User initialization.
//!
//! Setup turns a new user into an initialized one in a single unit: the profile row, the
//! cash account, the default bank account and the category lists are written together or
//! not at all. A user can only be initialized once.

use crate::{
    core::{
        Ledger, Session,
        account::{AccountType, BANK_ACCOUNT_ID, CASH_ACCOUNT_ID, new_account_row},
        projection::{ChangeKind, LedgerChange},
    },
    entities::{Account, Category, UserProfile, category, user_profile},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{DbErr, Set, SqlErr, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Profile details supplied by the authentication collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    /// Sign-in email, if the provider supplied one
    pub email: Option<String>,
    /// Name shown in the interface
    pub display_name: Option<String>,
}

/// Opening balances entered on the setup screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningBalances {
    /// Opening balance of the `cash` account; must not be negative
    pub cash: Decimal,
    /// Opening balance of the default `bank` account; must not be negative
    pub bank: Decimal,
}

/// Returns whether the user has completed setup.
pub async fn is_initialized(ledger: &Ledger, session: &Session) -> Result<bool> {
    Ok(UserProfile::find_by_id(session.user_id().to_string())
        .one(ledger.database())
        .await?
        .is_some())
}

/// Initializes a user: profile, `cash` and `bank` accounts, and the configured category
/// lists.
///
/// # Errors
/// * `InvalidInput` - a negative opening balance
/// * `AlreadyInitialized` - setup already ran for this user, including when a concurrent
///   setup won the race
#[instrument(skip(ledger, session, user), fields(user = session.user_id()))]
pub async fn initialize_user(
    ledger: &Ledger,
    session: &Session,
    user: NewUser,
    opening: OpeningBalances,
) -> Result<()> {
    if opening.cash < Decimal::ZERO || opening.bank < Decimal::ZERO {
        return Err(Error::invalid("opening balances cannot be negative"));
    }

    let already = || Error::AlreadyInitialized {
        user: session.user_id().to_string(),
    };
    let defaults = &ledger.config().defaults;
    let categories = &ledger.config().categories;

    let txn = ledger.database().begin().await?;

    if UserProfile::find_by_id(session.user_id().to_string())
        .one(&txn)
        .await?
        .is_some()
    {
        return Err(already());
    }

    let profile = user_profile::ActiveModel {
        user_id: Set(session.user_id().to_string()),
        email: Set(user.email),
        display_name: Set(user.display_name),
        next_sequence: Set(1),
        created_at: Set(Utc::now()),
    };
    UserProfile::insert(profile)
        .exec_without_returning(&txn)
        .await
        .map_err(|e| unique_violation_as(e, already))?;

    Account::insert_many([
        new_account_row(
            session,
            CASH_ACCOUNT_ID,
            defaults.cash_name.clone(),
            AccountType::Cash,
            opening.cash,
        ),
        new_account_row(
            session,
            BANK_ACCOUNT_ID,
            defaults.bank_name.clone(),
            AccountType::Bank,
            opening.bank,
        ),
    ])
    .exec_without_returning(&txn)
    .await
    .map_err(|e| unique_violation_as(e, already))?;

    let rows: Vec<category::ActiveModel> = [("income", &categories.income), ("expense", &categories.expense)]
        .into_iter()
        .flat_map(|(kind, labels)| {
            labels.iter().enumerate().map(move |(position, label)| category::ActiveModel {
                user_id: Set(session.user_id().to_string()),
                kind: Set(kind.to_string()),
                position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
                label: Set(label.clone()),
            })
        })
        .collect();
    if !rows.is_empty() {
        Category::insert_many(rows).exec_without_returning(&txn).await?;
    }

    txn.commit().await?;

    info!(cash = %opening.cash, bank = %opening.bank, "User initialized");
    ledger.publish(LedgerChange::new(session, ChangeKind::UserInitialized));
    Ok(())
}

fn unique_violation_as(err: DbErr, to: impl FnOnce() -> Error) -> Error {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => to(),
        _ => Error::Database(err),
    }
}
