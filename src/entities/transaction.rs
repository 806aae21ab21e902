//! Transaction entity - One row per ledger event.
//!
//! All four event kinds share this table; `kind` selects which optional columns are
//! populated. The core never reads these columns directly but decodes each row into
//! `core::event::LedgerEvent`, rejecting rows whose shape does not match their kind.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Owning user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Immutable event identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// `"income"`, `"expense"`, `"transfer"` or `"peer-transfer"`
    pub kind: String,
    /// Always positive; the kind decides the sign
    pub amount: Decimal,
    /// Primary account for income, expense and peer transfers
    pub account_id: Option<String>,
    /// Denormalized primary account name, kept in sync on rename (income/expense only)
    pub account_name: Option<String>,
    /// Category label
    pub category: Option<String>,
    /// Source account of a transfer or peer transfer
    pub from_account_id: Option<String>,
    /// Source account name at the time of the transfer
    pub from_name: Option<String>,
    /// Destination account of a transfer
    pub to_account_id: Option<String>,
    /// Destination account name at the time of the transfer
    pub to_name: Option<String>,
    /// External party receiving a peer transfer
    pub recipient: Option<String>,
    /// Optional free-text note
    pub description: Option<String>,
    /// User-chosen date, used for display only
    pub date: Date,
    /// Server time the event was first recorded
    pub created_at: DateTimeUtc,
    /// Per-user strictly increasing ordering key
    pub sequence: i64,
}

/// Events reference accounts by id columns; the core resolves them itself
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
