//! Account entity - A named balance owned by one user.
//!
//! Balances are only written by the ledger core. Every write bumps `version`, which the
//! core uses as a compare-and-swap guard against concurrent writers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Owning user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Stable identifier, unique per user (`"cash"`, `"bank"` or a generated UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name (e.g., "Cash in Hand")
    pub name: String,
    /// `"cash"` or `"bank"`
    pub account_type: String,
    /// Current balance
    pub balance: Decimal,
    /// Balance the account was opened with
    pub initial_balance: Decimal,
    /// Optimistic-concurrency counter, incremented on every write
    pub version: i64,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Accounts are joined to events explicitly by the core rather than through relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
