//! Ledger event model.
//!
//! Income, expense, transfer and peer-transfer events share one table but have different
//! shapes. In memory they are the [`EventBody`] sum type, and every piece of ledger logic
//! matches on it exhaustively. The only place that knows the row layout is the
//! conversion between [`LedgerEvent`] and `entities::transaction`.
//!
//! Request types (`NewTransaction`, `NewTransfer`, `NewPeerTransfer`, `EventEdit`) are
//! validated before any store access.

use crate::{
    entities::transaction,
    errors::{Error, Result},
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Category every peer transfer is filed under.
pub const PEER_TRANSFER_CATEGORY: &str = "Peer Transfer";

/// Stored tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Money in to one account
    Income,
    /// Money out of one account
    Expense,
    /// Money between two of the user's accounts
    Transfer,
    /// Money out to someone outside the ledger
    PeerTransfer,
}

impl EventKind {
    /// Tag stored in the `kind` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::PeerTransfer => "peer-transfer",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "peer-transfer" => Ok(Self::PeerTransfer),
            other => Err(Error::corrupt(format!("unknown event kind '{other}'"))),
        }
    }
}

/// Direction of a single-account entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Credits the account
    Income,
    /// Debits the account; may overdraw
    Expense,
}

impl EntryType {
    /// Signed balance effect of an entry of this type.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

/// Income or expense on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Always positive
    pub amount: Decimal,
    /// Credited or debited account
    pub account_id: String,
    /// Current account name; rewritten when the account is renamed
    pub account_name: String,
    /// Category label
    pub category: String,
}

/// Movement between two of the user's own accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Always positive
    pub amount: Decimal,
    /// Debited account
    pub from_account_id: String,
    /// Source name when the transfer was recorded
    pub from_name: String,
    /// Credited account
    pub to_account_id: String,
    /// Destination name when the transfer was recorded
    pub to_name: String,
}

/// Payment to someone outside the tracked accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerTransfer {
    /// Always positive
    pub amount: Decimal,
    /// Debited account
    pub account_id: String,
    /// Source name when the payment was recorded
    pub from_name: String,
    /// External party that received the money
    pub recipient: String,
}

/// Kind-specific part of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventBody {
    /// Credits `Entry::account_id`
    Income(Entry),
    /// Debits `Entry::account_id`
    Expense(Entry),
    /// Debits the source and credits the destination
    Transfer(Transfer),
    /// Debits the source only
    PeerTransfer(PeerTransfer),
}

impl EventBody {
    /// Stored tag of this body.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Income(_) => EventKind::Income,
            Self::Expense(_) => EventKind::Expense,
            Self::Transfer(_) => EventKind::Transfer,
            Self::PeerTransfer(_) => EventKind::PeerTransfer,
        }
    }

    /// Positive amount, whatever the kind.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        match self {
            Self::Income(entry) | Self::Expense(entry) => entry.amount,
            Self::Transfer(transfer) => transfer.amount,
            Self::PeerTransfer(peer) => peer.amount,
        }
    }

    /// Category label; transfers have none.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Income(entry) | Self::Expense(entry) => Some(&entry.category),
            Self::Transfer(_) => None,
            Self::PeerTransfer(_) => Some(PEER_TRANSFER_CATEGORY),
        }
    }

    /// Signed effect of this event on every account it references.
    #[must_use]
    pub fn effects(&self) -> Vec<(&str, Decimal)> {
        match self {
            Self::Income(entry) => vec![(entry.account_id.as_str(), entry.amount)],
            Self::Expense(entry) => vec![(entry.account_id.as_str(), -entry.amount)],
            Self::Transfer(transfer) => vec![
                (transfer.from_account_id.as_str(), -transfer.amount),
                (transfer.to_account_id.as_str(), transfer.amount),
            ],
            Self::PeerTransfer(peer) => vec![(peer.account_id.as_str(), -peer.amount)],
        }
    }

    /// Signed effect on one account; zero if the event does not reference it.
    #[must_use]
    pub fn effect_on(&self, account_id: &str) -> Decimal {
        self.effects()
            .into_iter()
            .filter(|(id, _)| *id == account_id)
            .map(|(_, delta)| delta)
            .sum()
    }

    /// Every account the event references.
    #[must_use]
    pub fn account_ids(&self) -> Vec<&str> {
        self.effects().into_iter().map(|(id, _)| id).collect()
    }
}

/// A committed ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Immutable identifier used for edits and deletes
    pub id: String,
    /// Kind-specific data
    pub body: EventBody,
    /// User-chosen date, for display
    pub date: NaiveDate,
    /// Optional note, trimmed; never blank
    pub description: Option<String>,
    /// When the event was first recorded; kept across edits
    pub created_at: DateTime<Utc>,
    /// Authoritative ordering key, strictly increasing per user
    pub sequence: i64,
}

impl LedgerEvent {
    /// Builds the row for this event.
    #[must_use]
    pub fn to_active_model(&self, user_id: &str) -> transaction::ActiveModel {
        let mut row = transaction::ActiveModel {
            user_id: Set(user_id.to_string()),
            id: Set(self.id.clone()),
            kind: Set(self.body.kind().as_str().to_string()),
            amount: Set(self.body.amount()),
            account_id: Set(None),
            account_name: Set(None),
            category: Set(self.body.category().map(ToString::to_string)),
            from_account_id: Set(None),
            from_name: Set(None),
            to_account_id: Set(None),
            to_name: Set(None),
            recipient: Set(None),
            description: Set(self.description.clone()),
            date: Set(self.date),
            created_at: Set(self.created_at),
            sequence: Set(self.sequence),
        };

        match &self.body {
            EventBody::Income(entry) | EventBody::Expense(entry) => {
                row.account_id = Set(Some(entry.account_id.clone()));
                row.account_name = Set(Some(entry.account_name.clone()));
            }
            EventBody::Transfer(transfer) => {
                row.from_account_id = Set(Some(transfer.from_account_id.clone()));
                row.from_name = Set(Some(transfer.from_name.clone()));
                row.to_account_id = Set(Some(transfer.to_account_id.clone()));
                row.to_name = Set(Some(transfer.to_name.clone()));
            }
            EventBody::PeerTransfer(peer) => {
                // The source is both the primary account and the "from" leg, so
                // account lookups and reference counts treat it uniformly.
                row.account_id = Set(Some(peer.account_id.clone()));
                row.from_account_id = Set(Some(peer.account_id.clone()));
                row.from_name = Set(Some(peer.from_name.clone()));
                row.recipient = Set(Some(peer.recipient.clone()));
            }
        }

        row
    }
}

fn required(value: Option<String>, column: &str, id: &str) -> Result<String> {
    value.ok_or_else(|| Error::corrupt(format!("event {id} is missing {column}")))
}

impl TryFrom<transaction::Model> for LedgerEvent {
    type Error = Error;

    fn try_from(row: transaction::Model) -> Result<Self> {
        let kind: EventKind = row.kind.parse()?;
        let id = row.id;

        let entry = |account_id: Option<String>,
                     account_name: Option<String>,
                     category: Option<String>|
         -> Result<Entry> {
            Ok(Entry {
                amount: row.amount,
                account_id: required(account_id, "account_id", &id)?,
                account_name: account_name.unwrap_or_default(),
                category: required(category, "category", &id)?,
            })
        };

        let body = match kind {
            EventKind::Income => {
                EventBody::Income(entry(row.account_id, row.account_name, row.category)?)
            }
            EventKind::Expense => {
                EventBody::Expense(entry(row.account_id, row.account_name, row.category)?)
            }
            EventKind::Transfer => EventBody::Transfer(Transfer {
                amount: row.amount,
                from_account_id: required(row.from_account_id, "from_account_id", &id)?,
                from_name: row.from_name.unwrap_or_default(),
                to_account_id: required(row.to_account_id, "to_account_id", &id)?,
                to_name: row.to_name.unwrap_or_default(),
            }),
            EventKind::PeerTransfer => EventBody::PeerTransfer(PeerTransfer {
                amount: row.amount,
                account_id: required(row.account_id, "account_id", &id)?,
                from_name: row.from_name.unwrap_or_default(),
                recipient: required(row.recipient, "recipient", &id)?,
            }),
        };

        if body.amount() <= Decimal::ZERO {
            return Err(Error::corrupt(format!("event {id} has non-positive amount")));
        }

        Ok(Self {
            id,
            body,
            date: row.date,
            description: row.description,
            created_at: row.created_at,
            sequence: row.sequence,
        })
    }
}

/// Today's date as the user sees it.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn check_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid(format!("amount must be positive, got {amount}")));
    }
    Ok(())
}

fn check_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date > today {
        return Err(Error::invalid(format!("date {date} is in the future")));
    }
    Ok(())
}

fn check_id(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid(format!("{what} is required")));
    }
    Ok(())
}

/// Trims a free-text note, treating blank text as absent.
#[must_use]
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Request to record an income or expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Account to credit or debit
    pub account_id: String,
    /// Income or expense
    pub entry_type: EntryType,
    /// Must be positive
    pub amount: Decimal,
    /// Must not be blank
    pub category: String,
    /// Must not be after today
    pub date: NaiveDate,
    /// Optional note
    pub description: Option<String>,
}

impl NewTransaction {
    /// Checks the request and normalizes its free-text fields.
    ///
    /// # Errors
    /// `InvalidInput` for a non-positive amount, a blank account or category, or a
    /// future date.
    pub fn validated(mut self, today: NaiveDate) -> Result<Self> {
        check_amount(self.amount)?;
        check_id(&self.account_id, "account")?;
        self.category = self.category.trim().to_string();
        check_id(&self.category, "category")?;
        check_date(self.date, today)?;
        self.description = normalize_description(self.description);
        Ok(self)
    }

    /// Event body for this request, given the account's current name.
    #[must_use]
    pub fn body(&self, account_name: String) -> EventBody {
        let entry = Entry {
            amount: self.amount,
            account_id: self.account_id.clone(),
            account_name,
            category: self.category.clone(),
        };
        match self.entry_type {
            EntryType::Income => EventBody::Income(entry),
            EntryType::Expense => EventBody::Expense(entry),
        }
    }
}

/// Request to move money between two of the user's accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    /// Account to debit; must cover the amount
    pub from_account_id: String,
    /// Account to credit; must differ from the source
    pub to_account_id: String,
    /// Must be positive
    pub amount: Decimal,
    /// Must not be after today
    pub date: NaiveDate,
    /// Optional note
    pub description: Option<String>,
}

impl NewTransfer {
    /// # Errors
    /// `InvalidInput` for a non-positive amount, identical source and destination, or a
    /// future date.
    pub fn validated(mut self, today: NaiveDate) -> Result<Self> {
        check_amount(self.amount)?;
        check_id(&self.from_account_id, "source account")?;
        check_id(&self.to_account_id, "destination account")?;
        if self.from_account_id == self.to_account_id {
            return Err(Error::invalid(
                "source and destination accounts must differ",
            ));
        }
        check_date(self.date, today)?;
        self.description = normalize_description(self.description);
        Ok(self)
    }

    /// Event body for this request, given both accounts' current names.
    #[must_use]
    pub fn body(&self, from_name: String, to_name: String) -> EventBody {
        EventBody::Transfer(Transfer {
            amount: self.amount,
            from_account_id: self.from_account_id.clone(),
            from_name,
            to_account_id: self.to_account_id.clone(),
            to_name,
        })
    }
}

/// Request to pay someone outside the tracked accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPeerTransfer {
    /// Account to debit; must cover the amount
    pub account_id: String,
    /// Must be positive
    pub amount: Decimal,
    /// Who was paid; must not be blank
    pub recipient: String,
    /// Must not be after today
    pub date: NaiveDate,
    /// Optional note
    pub description: Option<String>,
}

impl NewPeerTransfer {
    /// # Errors
    /// `InvalidInput` for a non-positive amount, a blank recipient, or a future date.
    pub fn validated(mut self, today: NaiveDate) -> Result<Self> {
        check_amount(self.amount)?;
        check_id(&self.account_id, "account")?;
        self.recipient = self.recipient.trim().to_string();
        check_id(&self.recipient, "recipient name")?;
        check_date(self.date, today)?;
        self.description = normalize_description(self.description);
        Ok(self)
    }

    /// Event body for this request, given the source account's current name.
    #[must_use]
    pub fn body(&self, from_name: String) -> EventBody {
        EventBody::PeerTransfer(PeerTransfer {
            amount: self.amount,
            account_id: self.account_id.clone(),
            from_name,
            recipient: self.recipient.clone(),
        })
    }
}

/// Replacement data for an existing event. The variant must match the stored event's
/// kind; income and expense may be swapped for one another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEdit {
    /// Replaces an income or expense
    Entry(NewTransaction),
    /// Replaces a transfer
    Transfer(NewTransfer),
    /// Replaces a peer transfer
    PeerTransfer(NewPeerTransfer),
}

impl EventEdit {
    /// # Errors
    /// Whatever the wrapped request's validation rejects.
    pub fn validated(self, today: NaiveDate) -> Result<Self> {
        Ok(match self {
            Self::Entry(request) => Self::Entry(request.validated(today)?),
            Self::Transfer(request) => Self::Transfer(request.validated(today)?),
            Self::PeerTransfer(request) => Self::PeerTransfer(request.validated(today)?),
        })
    }

    /// Rejects edits that would turn an event into a different kind.
    ///
    /// # Errors
    /// `InvalidInput` when the edit's shape does not fit `existing`.
    pub fn ensure_same_kind(&self, existing: EventKind) -> Result<()> {
        let compatible = matches!(
            (existing, self),
            (EventKind::Income | EventKind::Expense, Self::Entry(_))
                | (EventKind::Transfer, Self::Transfer(_))
                | (EventKind::PeerTransfer, Self::PeerTransfer(_))
        );
        if compatible {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "cannot change a {existing} into a {}",
                self.kind()
            )))
        }
    }

    /// Kind the edited event will have.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Entry(request) => match request.entry_type {
                EntryType::Income => EventKind::Income,
                EntryType::Expense => EventKind::Expense,
            },
            Self::Transfer(_) => EventKind::Transfer,
            Self::PeerTransfer(_) => EventKind::PeerTransfer,
        }
    }

    /// Accounts the replacement references.
    #[must_use]
    pub fn account_ids(&self) -> Vec<&str> {
        match self {
            Self::Entry(request) => vec![request.account_id.as_str()],
            Self::Transfer(request) => vec![
                request.from_account_id.as_str(),
                request.to_account_id.as_str(),
            ],
            Self::PeerTransfer(request) => vec![request.account_id.as_str()],
        }
    }

    /// Replacement date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        match self {
            Self::Entry(request) => request.date,
            Self::Transfer(request) => request.date,
            Self::PeerTransfer(request) => request.date,
        }
    }

    /// Replacement note.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Entry(request) => request.description.clone(),
            Self::Transfer(request) => request.description.clone(),
            Self::PeerTransfer(request) => request.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(amount: i64) -> NewTransaction {
        NewTransaction {
            account_id: "bank".to_string(),
            entry_type: EntryType::Expense,
            amount: Decimal::from(amount),
            category: " Food ".to_string(),
            date: day(2025, 3, 1),
            description: Some("   ".to_string()),
        }
    }

    #[test]
    fn test_event_kind_round_trips_through_storage_tag() {
        for kind in [
            EventKind::Income,
            EventKind::Expense,
            EventKind::Transfer,
            EventKind::PeerTransfer,
        ] {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!(matches!(
            "refund".parse::<EventKind>(),
            Err(Error::CorruptRecord { message: _ })
        ));
    }

    #[test]
    fn test_transaction_validation() {
        let today = day(2025, 3, 10);

        let ok = expense(200).validated(today).unwrap();
        assert_eq!(ok.category, "Food");
        assert_eq!(ok.description, None);

        assert!(matches!(
            expense(0).validated(today),
            Err(Error::InvalidInput { message: _ })
        ));
        assert!(matches!(
            expense(-5).validated(today),
            Err(Error::InvalidInput { message: _ })
        ));

        let mut blank_category = expense(10);
        blank_category.category = "  ".to_string();
        assert!(blank_category.validated(today).is_err());

        let mut future = expense(10);
        future.date = day(2025, 3, 11);
        assert!(matches!(
            future.validated(today),
            Err(Error::InvalidInput { message: _ })
        ));
    }

    #[test]
    fn test_transfer_rejects_same_account() {
        let request = NewTransfer {
            from_account_id: "cash".to_string(),
            to_account_id: "cash".to_string(),
            amount: Decimal::from(10),
            date: day(2025, 1, 1),
            description: None,
        };
        assert!(matches!(
            request.validated(day(2025, 1, 1)),
            Err(Error::InvalidInput { message: _ })
        ));
    }

    #[test]
    fn test_peer_transfer_requires_recipient() {
        let request = NewPeerTransfer {
            account_id: "cash".to_string(),
            amount: Decimal::from(10),
            recipient: " ".to_string(),
            date: day(2025, 1, 1),
            description: None,
        };
        assert!(request.validated(day(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_effects_by_kind() {
        let transfer = EventBody::Transfer(Transfer {
            amount: Decimal::from(300),
            from_account_id: "bank".to_string(),
            from_name: "Bank Account".to_string(),
            to_account_id: "cash".to_string(),
            to_name: "Cash in Hand".to_string(),
        });
        assert_eq!(transfer.effect_on("bank"), Decimal::from(-300));
        assert_eq!(transfer.effect_on("cash"), Decimal::from(300));
        assert_eq!(transfer.effect_on("savings"), Decimal::ZERO);
        assert_eq!(transfer.category(), None);

        let peer = EventBody::PeerTransfer(PeerTransfer {
            amount: Decimal::from(100),
            account_id: "cash".to_string(),
            from_name: "Cash in Hand".to_string(),
            recipient: "Alice".to_string(),
        });
        assert_eq!(peer.effects(), vec![("cash", Decimal::from(-100))]);
        assert_eq!(peer.category(), Some(PEER_TRANSFER_CATEGORY));

        let entry = expense(50).body("Bank Account".to_string());
        assert_eq!(entry.kind(), EventKind::Expense);
        assert_eq!(entry.effect_on("bank"), Decimal::from(-50));
    }

    #[test]
    fn test_cross_kind_edits_rejected() {
        let entry = EventEdit::Entry(expense(10));
        assert!(entry.ensure_same_kind(EventKind::Income).is_ok());
        assert!(entry.ensure_same_kind(EventKind::Expense).is_ok());
        assert!(matches!(
            entry.ensure_same_kind(EventKind::Transfer),
            Err(Error::InvalidInput { message: _ })
        ));
        assert!(entry.ensure_same_kind(EventKind::PeerTransfer).is_err());
    }

    #[test]
    fn test_row_conversion_preserves_event() {
        let event = LedgerEvent {
            id: "evt-1".to_string(),
            body: EventBody::PeerTransfer(PeerTransfer {
                amount: Decimal::new(12_550, 2),
                account_id: "cash".to_string(),
                from_name: "Cash in Hand".to_string(),
                recipient: "Alice".to_string(),
            }),
            date: day(2025, 2, 14),
            description: Some("dinner".to_string()),
            created_at: Utc::now(),
            sequence: 7,
        };

        let row = event.to_active_model("user-1");
        let model = transaction::Model {
            user_id: row.user_id.unwrap(),
            id: row.id.unwrap(),
            kind: row.kind.unwrap(),
            amount: row.amount.unwrap(),
            account_id: row.account_id.unwrap(),
            account_name: row.account_name.unwrap(),
            category: row.category.unwrap(),
            from_account_id: row.from_account_id.unwrap(),
            from_name: row.from_name.unwrap(),
            to_account_id: row.to_account_id.unwrap(),
            to_name: row.to_name.unwrap(),
            recipient: row.recipient.unwrap(),
            description: row.description.unwrap(),
            date: row.date.unwrap(),
            created_at: row.created_at.unwrap(),
            sequence: row.sequence.unwrap(),
        };

        assert_eq!(model.kind, "peer-transfer");
        assert_eq!(model.category.as_deref(), Some(PEER_TRANSFER_CATEGORY));
        assert_eq!(model.from_account_id.as_deref(), Some("cash"));
        assert_eq!(LedgerEvent::try_from(model).unwrap(), event);
    }

    #[test]
    fn test_row_with_missing_columns_is_corrupt() {
        let row = transaction::Model {
            user_id: "user-1".to_string(),
            id: "evt-2".to_string(),
            kind: "transfer".to_string(),
            amount: Decimal::from(5),
            account_id: None,
            account_name: None,
            category: None,
            from_account_id: Some("bank".to_string()),
            from_name: None,
            to_account_id: None,
            to_name: None,
            recipient: None,
            description: None,
            date: day(2025, 1, 1),
            created_at: Utc::now(),
            sequence: 1,
        };
        assert!(matches!(
            LedgerEvent::try_from(row),
            Err(Error::CorruptRecord { message: _ })
        ));
    }
}
