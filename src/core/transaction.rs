//! Transaction business logic - Orchestrates ledger writes.
//!
//! Creating a transaction validates the event shape, resolves and checks every
//! referenced entity inside one session, persists the transaction, applies its balance
//! effect, and for income distributes it across allocations. Either all of it commits
//! or none of it does. Cancelling tombstones the transaction and reverts its balance
//! effect in the same way.
//!
//! Allocation shares written for an income are kept when that income is cancelled.

use crate::{
    core::{
        Ledger, allocation,
        allocation::DistributionSummary,
        balance::{self, BalanceEvent},
        category,
        store::{self, Visibility},
    },
    entities::{
        Pocket, PocketType, Transaction, TransactionType, UserPlatform, pocket, transaction,
        user_platform,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Largest page a listing may return
pub const MAX_PAGE_SIZE: u64 = 100;
/// Page size used when none is requested
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Who is asking for the mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MutationScope {
    /// A user request from the API or bot; locked pockets are off limits
    #[default]
    User,
    /// Payroll or allocation schedulers; may touch locked pockets
    Elevated,
}

/// A transaction as submitted by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Event type
    pub transaction_type: TransactionType,
    /// Strictly positive amount in minor units
    pub amount: i64,
    /// Business date; defaults to now
    pub date: Option<DateTime<Utc>>,
    /// Source pocket
    pub pocket_from: Option<i64>,
    /// Destination pocket
    pub pocket_to: Option<i64>,
    /// Source user platform
    pub user_platform_from: Option<i64>,
    /// Destination user platform
    pub user_platform_to: Option<i64>,
    /// Optional category
    pub category_id: Option<i64>,
    /// Free-form note
    pub note: Option<String>,
    /// External reference
    pub reference: Option<String>,
}

impl NewTransaction {
    /// An event of the given type and amount with no participants yet.
    #[must_use]
    pub const fn new(transaction_type: TransactionType, amount: i64) -> Self {
        Self {
            transaction_type,
            amount,
            date: None,
            pocket_from: None,
            pocket_to: None,
            user_platform_from: None,
            user_platform_to: None,
            category_id: None,
            note: None,
            reference: None,
        }
    }

    const fn balance_event(&self) -> BalanceEvent {
        BalanceEvent {
            transaction_type: self.transaction_type,
            amount: self.amount,
            pocket_from: self.pocket_from,
            pocket_to: self.pocket_to,
            user_platform_from: self.user_platform_from,
            user_platform_to: self.user_platform_to,
        }
    }
}

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTransaction {
    /// The persisted transaction
    pub transaction: transaction::Model,
    /// Allocation outcome; present for income only
    pub distribution: Option<DistributionSummary>,
}

/// Listing filters; every field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Inclusive lower bound on `date`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `date`
    pub to: Option<DateTime<Utc>>,
    /// Only this type
    pub transaction_type: Option<TransactionType>,
    /// Only this category
    pub category_id: Option<i64>,
    /// Only transactions where this pocket is source or destination
    pub pocket_id: Option<i64>,
    /// Only transactions where this user platform is source or destination
    pub user_platform_id: Option<i64>,
}

/// Offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Maximum rows to return, clamped to `1..=100`
    pub limit: u64,
    /// Rows to skip
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    /// Rows ordered by `date desc, id desc`
    pub items: Vec<transaction::Model>,
    /// Rows matching the filter across all pages
    pub total: u64,
    /// Effective limit after clamping
    pub limit: u64,
    /// Offset used
    pub offset: u64,
}

/// Records a transaction and applies its effects atomically.
///
/// # Errors
/// - `InvalidInput` kinds for bad shapes, amounts, inactive participants, or
///   insufficient funds; nothing is written
/// - `NotFound` if a referenced entity is absent, deleted, or another user's
/// - `Forbidden` if a user-scope expense or transfer touches a locked pocket
/// - `Transient` kinds if the store fails or the deadline elapses; the session is
///   rolled back
#[instrument(skip(ledger, event), fields(transaction_type = ?event.transaction_type, amount = event.amount))]
pub async fn create_transaction(
    ledger: &Ledger,
    user_id: &str,
    event: NewTransaction,
    scope: MutationScope,
) -> Result<CreatedTransaction> {
    let balance_event = event.balance_event();
    balance::validate_shape(&balance_event)?;

    store::with_deadline(
        "create_transaction",
        ledger.store_timeout,
        create_in_session(ledger, user_id, event, balance_event, scope),
    )
    .await
    .inspect_err(|e| warn!(user_id, error = %e, "Transaction not recorded"))
}

async fn create_in_session(
    ledger: &Ledger,
    user_id: &str,
    event: NewTransaction,
    balance_event: BalanceEvent,
    scope: MutationScope,
) -> Result<CreatedTransaction> {
    let now = ledger.now();
    let txn = ledger.database.begin().await?;

    let participants = Participants::resolve(&txn, user_id, &balance_event).await?;
    participants.ensure_active()?;
    if event.transaction_type != TransactionType::Income && scope == MutationScope::User {
        participants.ensure_unlocked()?;
    }
    participants.ensure_sufficient(&balance_event)?;
    if let Some(category_id) = event.category_id {
        category::get_category(&txn, user_id, category_id).await?;
    }

    let created = transaction::ActiveModel {
        user_id: Set(user_id.to_string()),
        transaction_type: Set(event.transaction_type),
        amount: Set(event.amount),
        date: Set(event.date.unwrap_or(now)),
        pocket_from_id: Set(event.pocket_from),
        pocket_to_id: Set(event.pocket_to),
        user_platform_from_id: Set(event.user_platform_from),
        user_platform_to_id: Set(event.user_platform_to),
        category_id: Set(event.category_id),
        note: Set(event.note),
        reference: Set(event.reference),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    balance::apply(&txn, &balance_event, now).await?;

    let distribution = if created.transaction_type == TransactionType::Income {
        Some(allocation::distribute(&txn, user_id, created.id, created.amount, now).await?)
    } else {
        None
    };

    txn.commit().await?;
    info!(
        user_id,
        transaction_id = created.id,
        transaction_type = ?created.transaction_type,
        amount = created.amount,
        "Transaction recorded"
    );

    Ok(CreatedTransaction {
        transaction: created,
        distribution,
    })
}

/// Cancels a transaction: tombstones it and reverts its balance effect atomically.
///
/// Allocation logs and `current_amount` written for a cancelled income stay as they
/// are.
///
/// # Errors
/// - `NotFound` if the transaction is absent, already cancelled, or another user's
/// - `Forbidden` if a user-scope cancel touches a locked pocket
/// - `Transient` kinds on store failure or deadline
#[instrument(skip(ledger))]
pub async fn cancel_transaction(
    ledger: &Ledger,
    user_id: &str,
    transaction_id: i64,
    scope: MutationScope,
) -> Result<transaction::Model> {
    store::with_deadline(
        "cancel_transaction",
        ledger.store_timeout,
        cancel_in_session(ledger, user_id, transaction_id, scope),
    )
    .await
}

async fn cancel_in_session(
    ledger: &Ledger,
    user_id: &str,
    transaction_id: i64,
    scope: MutationScope,
) -> Result<transaction::Model> {
    let now = ledger.now();
    let txn = ledger.database.begin().await?;

    let existing =
        store::get_owned::<Transaction, _>(&txn, "transaction", user_id, transaction_id).await?;
    let balance_event = BalanceEvent::from_transaction(&existing);

    if scope == MutationScope::User {
        Participants::resolve(&txn, user_id, &balance_event)
            .await?
            .ensure_unlocked()?;
    }

    let mut active: transaction::ActiveModel = existing.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    let cancelled = active.update(&txn).await?;

    balance::revert(&txn, &balance_event, now).await?;

    txn.commit().await?;
    info!(user_id, transaction_id, "Transaction cancelled");
    Ok(cancelled)
}

/// Loads an alive transaction owned by `user_id`.
///
/// # Errors
/// Returns `Error::NotFound` if absent, cancelled, or foreign.
pub async fn get_transaction<C>(db: &C, user_id: &str, transaction_id: i64) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    store::get_owned::<Transaction, _>(db, "transaction", user_id, transaction_id).await
}

/// Loads a transaction owned by `user_id` even if it was cancelled.
pub async fn get_transaction_including_deleted<C>(
    db: &C,
    user_id: &str,
    transaction_id: i64,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    store::find_for_user::<Transaction>(user_id, Visibility::IncludeDeleted)
        .filter(transaction::Column::Id.eq(transaction_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the user's alive transactions matching `filter`, newest business date first.
///
/// # Errors
/// Returns `Error::InvalidInput` if `from` is not before `to`, or the store error.
pub async fn list_transactions<C>(
    db: &C,
    user_id: &str,
    filter: &TransactionFilter,
    page: Page,
) -> Result<TransactionPage>
where
    C: ConnectionTrait,
{
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(Error::invalid("Date range start must be before its end"));
    }

    let limit = page.limit.clamp(1, MAX_PAGE_SIZE);
    let mut query = store::find_for_user::<Transaction>(user_id, Visibility::Alive);
    if let Some(from) = filter.from {
        query = query.filter(transaction::Column::Date.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(transaction::Column::Date.lt(to));
    }
    if let Some(transaction_type) = filter.transaction_type {
        query = query.filter(transaction::Column::TransactionType.eq(transaction_type));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(transaction::Column::CategoryId.eq(category_id));
    }
    if let Some(pocket_id) = filter.pocket_id {
        query = query.filter(
            Condition::any()
                .add(transaction::Column::PocketFromId.eq(pocket_id))
                .add(transaction::Column::PocketToId.eq(pocket_id)),
        );
    }
    if let Some(user_platform_id) = filter.user_platform_id {
        query = query.filter(
            Condition::any()
                .add(transaction::Column::UserPlatformFromId.eq(user_platform_id))
                .add(transaction::Column::UserPlatformToId.eq(user_platform_id)),
        );
    }

    let total = query.clone().count(db).await?;
    let items = query
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .offset(page.offset)
        .limit(limit)
        .all(db)
        .await?;

    Ok(TransactionPage {
        items,
        total,
        limit,
        offset: page.offset,
    })
}

/// Resolved, ownership-checked participants of one event
struct Participants {
    pocket_from: Option<pocket::Model>,
    pocket_to: Option<pocket::Model>,
    user_platform_from: Option<user_platform::Model>,
    user_platform_to: Option<user_platform::Model>,
}

impl Participants {
    async fn resolve<C>(conn: &C, user_id: &str, event: &BalanceEvent) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        Ok(Self {
            pocket_from: resolve_pocket(conn, user_id, event.pocket_from).await?,
            pocket_to: resolve_pocket(conn, user_id, event.pocket_to).await?,
            user_platform_from: resolve_platform(conn, user_id, event.user_platform_from).await?,
            user_platform_to: resolve_platform(conn, user_id, event.user_platform_to).await?,
        })
    }

    fn pockets(&self) -> impl Iterator<Item = &pocket::Model> {
        self.pocket_from.iter().chain(self.pocket_to.iter())
    }

    fn platforms(&self) -> impl Iterator<Item = &user_platform::Model> {
        self.user_platform_from
            .iter()
            .chain(self.user_platform_to.iter())
    }

    fn ensure_active(&self) -> Result<()> {
        if let Some(p) = self.pockets().find(|p| !p.is_active) {
            return Err(Error::invalid(format!("Pocket '{}' is inactive", p.name)));
        }
        if let Some(up) = self.platforms().find(|up| !up.is_active) {
            return Err(Error::invalid(format!("User platform {} is inactive", up.id)));
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<()> {
        match self.pockets().find(|p| p.is_locked) {
            Some(p) => Err(Error::forbidden(format!("Pocket '{}' is locked", p.name))),
            None => Ok(()),
        }
    }

    /// Sources must cover the amount; debt pockets may go negative. A source that is
    /// also its own destination nets to zero and is not checked.
    fn ensure_sufficient(&self, event: &BalanceEvent) -> Result<()> {
        if event.transaction_type == TransactionType::Income {
            return Ok(());
        }
        if let Some(p) = &self.pocket_from
            && event.pocket_to != Some(p.id)
            && p.pocket_type != PocketType::Debt
            && p.balance < event.amount
        {
            return Err(Error::invalid(format!(
                "Insufficient funds in pocket '{}': {} available, {} required",
                p.name, p.balance, event.amount
            )));
        }
        if let Some(up) = &self.user_platform_from
            && event.user_platform_to != Some(up.id)
            && up.balance < event.amount
        {
            return Err(Error::invalid(format!(
                "Insufficient funds in user platform {}: {} available, {} required",
                up.id, up.balance, event.amount
            )));
        }
        Ok(())
    }
}

async fn resolve_pocket<C>(conn: &C, user_id: &str, id: Option<i64>) -> Result<Option<pocket::Model>>
where
    C: ConnectionTrait,
{
    match id {
        Some(id) => store::get_owned::<Pocket, _>(conn, "pocket", user_id, id)
            .await
            .map(Some),
        None => Ok(None),
    }
}

async fn resolve_platform<C>(
    conn: &C,
    user_id: &str,
    id: Option<i64>,
) -> Result<Option<user_platform::Model>>
where
    C: ConnectionTrait,
{
    match id {
        Some(id) => store::get_owned::<UserPlatform, _>(conn, "user platform", user_id, id)
            .await
            .map(Some),
        None => Ok(None),
    }
}
