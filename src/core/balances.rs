//! Account working set with compare-and-swap writes.
//!
//! Every balance-affecting operation loads the accounts it touches into an [`AccountSet`]
//! inside its database transaction, applies signed deltas in memory, and writes each
//! changed account back exactly once. The write only succeeds if the account's `version`
//! is still the one that was read; otherwise the attempt fails with `Error::Conflict` and
//! the retry wrapper runs the operation again from a fresh read. Overlapping accounts
//! (e.g. a transfer edit whose old and new legs share an account) are therefore read and
//! written once, with the net delta.

use crate::{
    core::event::EventBody,
    entities::{Account, UserProfile, account, user_profile},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{prelude::*, sea_query::Expr};
use std::collections::BTreeMap;

#[derive(Debug)]
struct Slot {
    read: account::Model,
    balance: Decimal,
}

/// Accounts touched by one atomic unit.
#[derive(Debug)]
pub struct AccountSet {
    user_id: String,
    slots: BTreeMap<String, Slot>,
}

impl AccountSet {
    /// Loads the named accounts, failing if any of them is missing.
    ///
    /// # Errors
    /// `NotFound` for the first missing account id.
    pub async fn load<'a, C, I>(db: &C, user_id: &str, ids: I) -> Result<Self>
    where
        C: ConnectionTrait,
        I: IntoIterator<Item = &'a str>,
    {
        let ids: Vec<&str> = ids.into_iter().collect();
        let set = Self::load_existing(db, user_id, ids.iter().copied()).await?;
        if let Some(missing) = ids.iter().find(|id| !set.contains(id)) {
            return Err(Error::not_found("account", *missing));
        }
        Ok(set)
    }

    /// Loads whichever of the named accounts still exist.
    pub async fn load_existing<'a, C, I>(db: &C, user_id: &str, ids: I) -> Result<Self>
    where
        C: ConnectionTrait,
        I: IntoIterator<Item = &'a str>,
    {
        let mut ids: Vec<&str> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let rows = Account::find()
            .filter(account::Column::UserId.eq(user_id))
            .filter(account::Column::Id.is_in(ids))
            .all(db)
            .await?;

        let slots = rows
            .into_iter()
            .map(|row| {
                let balance = row.balance;
                (row.id.clone(), Slot { read: row, balance })
            })
            .collect();

        Ok(Self {
            user_id: user_id.to_string(),
            slots,
        })
    }

    /// Whether the account was found when the set was loaded.
    #[must_use]
    pub fn contains(&self, account_id: &str) -> bool {
        self.slots.contains_key(account_id)
    }

    fn slot(&self, account_id: &str) -> Result<&Slot> {
        self.slots
            .get(account_id)
            .ok_or_else(|| Error::not_found("account", account_id))
    }

    /// The account as it was read at the start of the unit.
    pub fn account(&self, account_id: &str) -> Result<&account::Model> {
        self.slot(account_id).map(|slot| &slot.read)
    }

    /// Name as read; used for the denormalized copies stored on events.
    pub fn name(&self, account_id: &str) -> Result<String> {
        self.account(account_id).map(|model| model.name.clone())
    }

    /// Balance including every delta applied so far.
    pub fn balance(&self, account_id: &str) -> Result<Decimal> {
        self.slot(account_id).map(|slot| slot.balance)
    }

    /// Adds a signed delta to the in-memory balance.
    pub fn adjust(&mut self, account_id: &str, delta: Decimal) -> Result<()> {
        let slot = self
            .slots
            .get_mut(account_id)
            .ok_or_else(|| Error::not_found("account", account_id))?;
        slot.balance += delta;
        Ok(())
    }

    /// Applies an event's effect on every account it references.
    pub fn apply(&mut self, body: &EventBody) -> Result<()> {
        for (account_id, delta) in body.effects() {
            self.adjust(account_id, delta)?;
        }
        Ok(())
    }

    /// Undoes an event's effect on every account it references.
    pub fn reverse(&mut self, body: &EventBody) -> Result<()> {
        for (account_id, delta) in body.effects() {
            self.adjust(account_id, -delta)?;
        }
        Ok(())
    }

    /// Fails unless the account currently holds at least `amount`.
    ///
    /// # Errors
    /// `InsufficientFunds` with the account name and its current balance.
    pub fn ensure_covers(&self, account_id: &str, amount: Decimal) -> Result<()> {
        let slot = self.slot(account_id)?;
        if slot.balance < amount {
            return Err(Error::InsufficientFunds {
                account: slot.read.name.clone(),
                available: slot.balance,
                required: amount,
            });
        }
        Ok(())
    }

    /// Writes every account whose balance changed and returns the stored rows.
    ///
    /// # Errors
    /// `Conflict` when any account was written by someone else since it was read.
    pub async fn commit<C>(self, db: &C) -> Result<Vec<account::Model>>
    where
        C: ConnectionTrait,
    {
        let mut written = Vec::new();
        for slot in self.slots.into_values() {
            if slot.balance == slot.read.balance {
                continue;
            }
            written.push(write_balance(db, &slot.read, slot.balance).await?);
        }
        tracing::trace!(user = %self.user_id, accounts = written.len(), "Balances written");
        Ok(written)
    }
}

/// Stores a new balance if the account still has the version it was read at.
///
/// # Errors
/// `Conflict` when the version moved on.
pub async fn write_balance<C>(
    db: &C,
    read: &account::Model,
    balance: Decimal,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let result = Account::update_many()
        .col_expr(account::Column::Balance, Expr::value(balance))
        .col_expr(
            account::Column::Version,
            Expr::col(account::Column::Version).add(1),
        )
        .filter(account::Column::UserId.eq(read.user_id.as_str()))
        .filter(account::Column::Id.eq(read.id.as_str()))
        .filter(account::Column::Version.eq(read.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            resource: read.id.clone(),
        });
    }

    Ok(account::Model {
        balance,
        version: read.version + 1,
        ..read.clone()
    })
}

/// Stores a new account name under the same version guard as balance writes.
///
/// # Errors
/// `Conflict` when the version moved on.
pub async fn write_name<C>(db: &C, read: &account::Model, name: &str) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let result = Account::update_many()
        .col_expr(account::Column::Name, Expr::value(name))
        .col_expr(
            account::Column::Version,
            Expr::col(account::Column::Version).add(1),
        )
        .filter(account::Column::UserId.eq(read.user_id.as_str()))
        .filter(account::Column::Id.eq(read.id.as_str()))
        .filter(account::Column::Version.eq(read.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            resource: read.id.clone(),
        });
    }

    Ok(account::Model {
        name: name.to_string(),
        version: read.version + 1,
        ..read.clone()
    })
}

/// Hands out the user's next event ordering key.
///
/// The counter lives on the user profile and is advanced with the same
/// compare-and-swap discipline as balances, so two concurrent inserts can never receive
/// the same key.
///
/// # Errors
/// `NotFound` if the user was never initialized, `Conflict` if another insert won.
pub async fn next_sequence<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let profile = UserProfile::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let result = UserProfile::update_many()
        .col_expr(
            user_profile::Column::NextSequence,
            Expr::col(user_profile::Column::NextSequence).add(1),
        )
        .filter(user_profile::Column::UserId.eq(user_id))
        .filter(user_profile::Column::NextSequence.eq(profile.next_sequence))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            resource: format!("{user_id}/sequence"),
        });
    }

    Ok(profile.next_sequence)
}
