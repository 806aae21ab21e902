//! Transaction business logic - Every balance-affecting ledger operation.
//!
//! Each public function here is one atomic unit. It validates its request before touching
//! the store, then runs inside a database transaction that reads the accounts it needs,
//! computes new balances in memory, writes the accounts with compare-and-swap, and writes
//! the event row. Any failure drops the transaction, so nothing is ever half applied. Lost
//! compare-and-swap races are retried by [`with_retry`]; once the unit has committed,
//! subscribers are notified through the ledger's change feed.
//!
//! Income and expense may overdraw an account. Transfers and peer transfers may not.

use crate::{
    core::{
        Ledger, Session,
        balances::{AccountSet, next_sequence},
        event::{EventBody, EventEdit, LedgerEvent, NewPeerTransfer, NewTransaction, NewTransfer, today},
        projection::{ChangeKind, LedgerChange},
        retry::with_retry,
    },
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Records an income or expense and moves the account balance by its amount.
///
/// Returns the stored event, whose `id` identifies it for later edits and deletes.
///
/// # Errors
/// * `InvalidInput` - non-positive amount, blank category, or future date
/// * `NotFound` - the account or the user profile does not exist
/// * `ConflictRetryExhausted` - the account kept changing underneath the operation
#[instrument(skip(ledger, session, request), fields(user = session.user_id()))]
pub async fn create_transaction(
    ledger: &Ledger,
    session: &Session,
    request: NewTransaction,
) -> Result<LedgerEvent> {
    let request = request.validated(today())?;
    let request = &request;

    let event = with_retry(ledger.retry_policy(), "create_transaction", move || {
        try_create_transaction(ledger.database(), session, request)
    })
    .await?;

    info!(
        event_id = %event.id,
        kind = %event.body.kind(),
        account = %request.account_id,
        amount = %request.amount,
        "Transaction recorded"
    );
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::TransactionCreated {
            id: event.id.clone(),
        },
    ));
    Ok(event)
}

async fn try_create_transaction(
    db: &DatabaseConnection,
    session: &Session,
    request: &NewTransaction,
) -> Result<LedgerEvent> {
    let txn = db.begin().await?;

    let mut accounts = AccountSet::load(&txn, session.user_id(), [request.account_id.as_str()]).await?;
    let body = request.body(accounts.name(&request.account_id)?);
    accounts.apply(&body)?;

    let event = new_event(&txn, session, body, request.date, request.description.clone()).await?;
    Transaction::insert(event.to_active_model(session.user_id()))
        .exec_without_returning(&txn)
        .await?;
    accounts.commit(&txn).await?;

    txn.commit().await?;
    Ok(event)
}

/// Moves money from one of the user's accounts to another.
///
/// Both account names are copied onto the event as they are right now; later renames do
/// not change them.
///
/// # Errors
/// * `InvalidInput` - non-positive amount, same source and destination, or future date
/// * `NotFound` - either account is missing
/// * `InsufficientFunds` - the source balance is below the amount
#[instrument(skip(ledger, session, request), fields(user = session.user_id()))]
pub async fn create_transfer(
    ledger: &Ledger,
    session: &Session,
    request: NewTransfer,
) -> Result<LedgerEvent> {
    let request = request.validated(today())?;
    let request = &request;

    let event = with_retry(ledger.retry_policy(), "create_transfer", move || {
        try_create_transfer(ledger.database(), session, request)
    })
    .await?;

    info!(
        event_id = %event.id,
        from = %request.from_account_id,
        to = %request.to_account_id,
        amount = %request.amount,
        "Transfer recorded"
    );
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::TransactionCreated {
            id: event.id.clone(),
        },
    ));
    Ok(event)
}

async fn try_create_transfer(
    db: &DatabaseConnection,
    session: &Session,
    request: &NewTransfer,
) -> Result<LedgerEvent> {
    let txn = db.begin().await?;

    let mut accounts = AccountSet::load(
        &txn,
        session.user_id(),
        [
            request.from_account_id.as_str(),
            request.to_account_id.as_str(),
        ],
    )
    .await?;
    accounts.ensure_covers(&request.from_account_id, request.amount)?;

    let body = request.body(
        accounts.name(&request.from_account_id)?,
        accounts.name(&request.to_account_id)?,
    );
    accounts.apply(&body)?;

    let event = new_event(&txn, session, body, request.date, request.description.clone()).await?;
    Transaction::insert(event.to_active_model(session.user_id()))
        .exec_without_returning(&txn)
        .await?;
    accounts.commit(&txn).await?;

    txn.commit().await?;
    Ok(event)
}

/// Pays someone outside the tracked accounts. The money leaves the ledger; there is no
/// matching credit.
///
/// # Errors
/// * `InvalidInput` - non-positive amount, blank recipient, or future date
/// * `NotFound` - the account is missing
/// * `InsufficientFunds` - the balance is below the amount
#[instrument(skip(ledger, session, request), fields(user = session.user_id()))]
pub async fn create_peer_transfer(
    ledger: &Ledger,
    session: &Session,
    request: NewPeerTransfer,
) -> Result<LedgerEvent> {
    let request = request.validated(today())?;
    let request = &request;

    let event = with_retry(ledger.retry_policy(), "create_peer_transfer", move || {
        try_create_peer_transfer(ledger.database(), session, request)
    })
    .await?;

    info!(
        event_id = %event.id,
        account = %request.account_id,
        recipient = %request.recipient,
        amount = %request.amount,
        "Peer transfer recorded"
    );
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::TransactionCreated {
            id: event.id.clone(),
        },
    ));
    Ok(event)
}

async fn try_create_peer_transfer(
    db: &DatabaseConnection,
    session: &Session,
    request: &NewPeerTransfer,
) -> Result<LedgerEvent> {
    let txn = db.begin().await?;

    let mut accounts = AccountSet::load(&txn, session.user_id(), [request.account_id.as_str()]).await?;
    accounts.ensure_covers(&request.account_id, request.amount)?;

    let body = request.body(accounts.name(&request.account_id)?);
    accounts.apply(&body)?;

    let event = new_event(&txn, session, body, request.date, request.description.clone()).await?;
    Transaction::insert(event.to_active_model(session.user_id()))
        .exec_without_returning(&txn)
        .await?;
    accounts.commit(&txn).await?;

    txn.commit().await?;
    Ok(event)
}

/// Replaces the body of an existing event, reversing its old effect and applying the new
/// one in the same unit.
///
/// The stored event is the one reversed, whatever copy the caller holds. Its id, creation
/// time and ordering key are kept. Income and expense may be swapped for each other and
/// moved to a different account; transfers stay transfers and peer transfers stay peer
/// transfers. For transfers and peer transfers the source must cover the new amount once
/// the old effect has been reversed.
///
/// # Errors
/// * `InvalidInput` - invalid replacement data or a change of kind
/// * `NotFound` - the event or any old or new account is missing
/// * `InsufficientFunds` - the new source cannot cover the new amount
#[instrument(skip(ledger, session, edit), fields(user = session.user_id()))]
pub async fn edit_transaction(
    ledger: &Ledger,
    session: &Session,
    event_id: &str,
    edit: EventEdit,
) -> Result<LedgerEvent> {
    let edit = edit.validated(today())?;
    let edit = &edit;

    let event = with_retry(ledger.retry_policy(), "edit_transaction", move || {
        try_edit_transaction(ledger.database(), session, event_id, edit)
    })
    .await?;

    info!(
        event_id,
        kind = %event.body.kind(),
        amount = %event.body.amount(),
        "Transaction edited"
    );
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::TransactionUpdated {
            id: event.id.clone(),
        },
    ));
    Ok(event)
}

async fn try_edit_transaction(
    db: &DatabaseConnection,
    session: &Session,
    event_id: &str,
    edit: &EventEdit,
) -> Result<LedgerEvent> {
    let txn = db.begin().await?;

    let old = load_event(&txn, session, event_id).await?;
    edit.ensure_same_kind(old.body.kind())?;

    let touched = old.body.account_ids().into_iter().chain(edit.account_ids());
    let mut accounts = AccountSet::load(&txn, session.user_id(), touched).await?;
    accounts.reverse(&old.body)?;

    let body = match edit {
        EventEdit::Entry(request) => request.body(accounts.name(&request.account_id)?),
        EventEdit::Transfer(request) => {
            accounts.ensure_covers(&request.from_account_id, request.amount)?;
            request.body(
                accounts.name(&request.from_account_id)?,
                accounts.name(&request.to_account_id)?,
            )
        }
        EventEdit::PeerTransfer(request) => {
            accounts.ensure_covers(&request.account_id, request.amount)?;
            request.body(accounts.name(&request.account_id)?)
        }
    };
    accounts.apply(&body)?;

    let updated = LedgerEvent {
        body,
        date: edit.date(),
        description: edit.description(),
        ..old
    };
    updated
        .to_active_model(session.user_id())
        .update(&txn)
        .await?;
    accounts.commit(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Removes an event and reverses its effect.
///
/// The reversal is skipped when an account the event references no longer exists (for a
/// transfer, when either leg is gone); the event is removed regardless, so an orphaned
/// event can always be cleaned up.
///
/// # Errors
/// * `NotFound` - the event does not exist
#[instrument(skip(ledger, session), fields(user = session.user_id()))]
pub async fn delete_transaction(ledger: &Ledger, session: &Session, event_id: &str) -> Result<LedgerEvent> {
    let event = with_retry(ledger.retry_policy(), "delete_transaction", move || {
        try_delete_transaction(ledger.database(), session, event_id)
    })
    .await?;

    info!(
        event_id,
        kind = %event.body.kind(),
        amount = %event.body.amount(),
        "Transaction deleted"
    );
    ledger.publish(LedgerChange::new(
        session,
        ChangeKind::TransactionDeleted {
            id: event.id.clone(),
        },
    ));
    Ok(event)
}

async fn try_delete_transaction(
    db: &DatabaseConnection,
    session: &Session,
    event_id: &str,
) -> Result<LedgerEvent> {
    let txn = db.begin().await?;

    let event = load_event(&txn, session, event_id).await?;
    let referenced = event.body.account_ids();
    let mut accounts =
        AccountSet::load_existing(&txn, session.user_id(), referenced.iter().copied()).await?;

    if referenced.iter().all(|id| accounts.contains(id)) {
        accounts.reverse(&event.body)?;
    } else {
        warn!(
            event_id,
            accounts = ?referenced,
            "Referenced account no longer exists, deleting event without reversal"
        );
    }

    Transaction::delete_by_id((session.user_id().to_string(), event.id.clone()))
        .exec(&txn)
        .await?;
    accounts.commit(&txn).await?;

    txn.commit().await?;
    Ok(event)
}

/// Retrieves a specific event by its id, returning None if it does not exist.
pub async fn get_transaction(
    ledger: &Ledger,
    session: &Session,
    event_id: &str,
) -> Result<Option<LedgerEvent>> {
    Transaction::find_by_id((session.user_id().to_string(), event_id.to_string()))
        .one(ledger.database())
        .await?
        .map(LedgerEvent::try_from)
        .transpose()
}

/// Retrieves all of the user's events, newest first by ordering key.
pub async fn list_transactions<C>(db: &C, session: &Session) -> Result<Vec<LedgerEvent>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(session.user_id()))
        .order_by_desc(transaction::Column::Sequence)
        .all(db)
        .await?
        .into_iter()
        .map(LedgerEvent::try_from)
        .collect()
}

async fn load_event<C>(db: &C, session: &Session, event_id: &str) -> Result<LedgerEvent>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id((session.user_id().to_string(), event_id.to_string()))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("transaction", event_id))
        .and_then(LedgerEvent::try_from)
}

async fn new_event<C>(
    db: &C,
    session: &Session,
    body: EventBody,
    date: chrono::NaiveDate,
    description: Option<String>,
) -> Result<LedgerEvent>
where
    C: ConnectionTrait,
{
    Ok(LedgerEvent {
        id: Uuid::new_v4().to_string(),
        body,
        date,
        description,
        created_at: Utc::now(),
        sequence: next_sequence(db, session.user_id()).await?,
    })
}
