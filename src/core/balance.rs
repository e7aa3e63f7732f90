//! Balance processor - the single authority that mutates pocket and user-platform
//! balances.
//!
//! Every change to a `balance` column goes through [`apply`] or [`revert`]. Both run on
//! the caller's session and never open their own, so the caller's commit or rollback
//! decides whether the deltas become visible. Updates are expressed as
//! `balance = balance + delta` in SQL so concurrent sessions never overwrite each
//! other's arithmetic with a stale read.
//!
//! Sufficiency is not checked here; the transaction service owns that policy.

use crate::{
    entities::{Pocket, TransactionType, UserPlatform, pocket, transaction, user_platform},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Participants and amount of one ledger event, as seen by the balance processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Event type
    pub transaction_type: TransactionType,
    /// Strictly positive amount in minor units
    pub amount: i64,
    /// Source pocket
    pub pocket_from: Option<i64>,
    /// Destination pocket
    pub pocket_to: Option<i64>,
    /// Source user platform
    pub user_platform_from: Option<i64>,
    /// Destination user platform
    pub user_platform_to: Option<i64>,
}

impl BalanceEvent {
    /// Extracts the balance-relevant part of a persisted transaction.
    #[must_use]
    pub const fn from_transaction(tx: &transaction::Model) -> Self {
        Self {
            transaction_type: tx.transaction_type,
            amount: tx.amount,
            pocket_from: tx.pocket_from_id,
            pocket_to: tx.pocket_to_id,
            user_platform_from: tx.user_platform_from_id,
            user_platform_to: tx.user_platform_to_id,
        }
    }
}

/// Allowed participant combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    /// Income into a pocket and/or a user platform
    Income,
    /// Expense from a pocket and/or a user platform
    Expense,
    /// Pocket to pocket; platforms untouched
    PocketTransfer,
    /// Platform to platform; pockets untouched
    PlatformTransfer,
    /// Both pocket pair and platform pair move
    FullTransfer,
}

/// Checks the participant combination against the event type.
///
/// # Errors
/// Returns `Error::InvalidAmount` for non-positive amounts and `Error::InvalidShape`
/// for any combination not listed in [`EventShape`].
pub fn validate_shape(event: &BalanceEvent) -> Result<EventShape> {
    if event.amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: event.amount,
        });
    }

    let has_from = event.pocket_from.is_some() || event.user_platform_from.is_some();
    let has_to = event.pocket_to.is_some() || event.user_platform_to.is_some();

    match event.transaction_type {
        TransactionType::Income if has_from => Err(shape_error("income cannot have a source")),
        TransactionType::Income if !has_to => {
            Err(shape_error("income needs a destination pocket or user platform"))
        }
        TransactionType::Income => Ok(EventShape::Income),
        TransactionType::Expense if has_to => {
            Err(shape_error("expense cannot have a destination"))
        }
        TransactionType::Expense if !has_from => {
            Err(shape_error("expense needs a source pocket or user platform"))
        }
        TransactionType::Expense => Ok(EventShape::Expense),
        TransactionType::Transfer => match (
            event.pocket_from.is_some(),
            event.pocket_to.is_some(),
            event.user_platform_from.is_some(),
            event.user_platform_to.is_some(),
        ) {
            (true, true, false, false) => Ok(EventShape::PocketTransfer),
            (false, false, true, true) => Ok(EventShape::PlatformTransfer),
            (true, true, true, true) => Ok(EventShape::FullTransfer),
            _ => Err(shape_error(
                "transfer needs both pockets, both user platforms, or all four",
            )),
        },
    }
}

fn shape_error(message: &str) -> Error {
    Error::InvalidShape {
        message: message.to_string(),
    }
}

/// A signed change to one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Pocket(i64, i64),
    UserPlatform(i64, i64),
}

impl Delta {
    const fn inverse(self) -> Self {
        match self {
            Self::Pocket(id, amount) => Self::Pocket(id, -amount),
            Self::UserPlatform(id, amount) => Self::UserPlatform(id, -amount),
        }
    }
}

/// Deltas for applying `event`. Debits come before credits so a self-transfer
/// still touches the account twice.
fn deltas(event: &BalanceEvent, shape: EventShape) -> Vec<Delta> {
    let amount = event.amount;
    let mut out = Vec::with_capacity(4);
    let debit_pocket = event.pocket_from.map(|id| Delta::Pocket(id, -amount));
    let credit_pocket = event.pocket_to.map(|id| Delta::Pocket(id, amount));
    let debit_platform = event
        .user_platform_from
        .map(|id| Delta::UserPlatform(id, -amount));
    let credit_platform = event
        .user_platform_to
        .map(|id| Delta::UserPlatform(id, amount));

    match shape {
        EventShape::Income => out.extend([credit_pocket, credit_platform].into_iter().flatten()),
        EventShape::Expense => out.extend([debit_pocket, debit_platform].into_iter().flatten()),
        EventShape::PocketTransfer => {
            out.extend([debit_pocket, credit_pocket].into_iter().flatten());
        }
        EventShape::PlatformTransfer => {
            out.extend([debit_platform, credit_platform].into_iter().flatten());
        }
        EventShape::FullTransfer => out.extend(
            [debit_pocket, credit_pocket, debit_platform, credit_platform]
                .into_iter()
                .flatten(),
        ),
    }
    out
}

/// Applies the balance effect of `event` on the caller's session.
///
/// # Errors
/// Returns a validation error for bad shapes or amounts, `Error::NotFound` if a
/// participant is missing or deleted, or the store error.
pub async fn apply<C>(conn: &C, event: &BalanceEvent, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let shape = validate_shape(event)?;
    debug!(?shape, amount = event.amount, "Applying balance event");
    for delta in deltas(event, shape) {
        write_delta(conn, delta, now).await?;
    }
    Ok(())
}

/// Undoes the balance effect of `event` on the caller's session.
///
/// Takes the same arguments as [`apply`]: income is withdrawn from its destinations,
/// expense is returned to its sources, and transfers flow back.
///
/// # Errors
/// Same as [`apply`].
pub async fn revert<C>(conn: &C, event: &BalanceEvent, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let shape = validate_shape(event)?;
    debug!(?shape, amount = event.amount, "Reverting balance event");
    for delta in deltas(event, shape).into_iter().rev() {
        write_delta(conn, delta.inverse(), now).await?;
    }
    Ok(())
}

async fn write_delta<C>(conn: &C, delta: Delta, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let rows = match delta {
        Delta::Pocket(id, amount) => {
            Pocket::update_many()
                .col_expr(
                    pocket::Column::Balance,
                    Expr::col(pocket::Column::Balance).add(amount),
                )
                .col_expr(pocket::Column::LastUseAt, Expr::value(Some(now)))
                .col_expr(pocket::Column::UpdatedAt, Expr::value(now))
                .filter(pocket::Column::Id.eq(id))
                .filter(pocket::Column::DeletedAt.is_null())
                .exec(conn)
                .await?
                .rows_affected
        }
        Delta::UserPlatform(id, amount) => {
            UserPlatform::update_many()
                .col_expr(
                    user_platform::Column::Balance,
                    Expr::col(user_platform::Column::Balance).add(amount),
                )
                .col_expr(user_platform::Column::LastUseAt, Expr::value(Some(now)))
                .col_expr(user_platform::Column::UpdatedAt, Expr::value(now))
                .filter(user_platform::Column::Id.eq(id))
                .filter(user_platform::Column::DeletedAt.is_null())
                .exec(conn)
                .await?
                .rows_affected
        }
    };

    if rows == 1 {
        return Ok(());
    }
    Err(match delta {
        Delta::Pocket(id, _) => Error::not_found("pocket", id),
        Delta::UserPlatform(id, _) => Error::not_found("user platform", id),
    })
}
