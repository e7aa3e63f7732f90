//! Daily summary builder - Materializes one day of a user's activity.
//!
//! A summary is rebuilt by replacing whatever was stored for `(user, date)`, so
//! running a build twice yields the same document apart from `updated_at`. Category
//! names are resolved at build time and cached in the breakdown; renaming a category
//! later does not rewrite history.

use crate::{
    core::{
        Ledger, category,
        store::{self, Visibility},
        time,
    },
    entities::{
        CategoryAmount, CategoryBreakdown, DailySummary, Transaction, TransactionType,
        daily_summary, transaction,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use sea_orm::{
    FromQueryResult, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{error, info, instrument};

/// Outcome of building every user's summary for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRunReport {
    /// Day that was built
    pub date: NaiveDate,
    /// Users whose summary was rebuilt or removed
    pub users_processed: usize,
    /// Users whose build failed and was skipped
    pub users_failed: usize,
}

/// Sum of alive transactions for one `(type, category)` pair
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub(crate) struct Bucket {
    pub transaction_type: TransactionType,
    pub category_id: Option<i64>,
    pub total: i64,
}

/// Groups the user's alive income and expense transactions dated in `[start, end)` by
/// type and category. Without `end` the window is open-ended.
pub(crate) async fn aggregate<C>(
    conn: &C,
    user_id: &str,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<Bucket>>
where
    C: ConnectionTrait,
{
    let mut query = store::find_for_user::<Transaction>(user_id, Visibility::Alive)
        .select_only()
        .column(transaction::Column::TransactionType)
        .column(transaction::Column::CategoryId)
        .column_as(transaction::Column::Amount.sum(), "total")
        .filter(
            transaction::Column::TransactionType
                .is_in([TransactionType::Income, TransactionType::Expense]),
        )
        .filter(transaction::Column::Date.gte(start));
    if let Some(end) = end {
        query = query.filter(transaction::Column::Date.lt(end));
    }

    query
        .group_by(transaction::Column::TransactionType)
        .group_by(transaction::Column::CategoryId)
        .order_by_asc(transaction::Column::TransactionType)
        .order_by_asc(transaction::Column::CategoryId)
        .into_model::<Bucket>()
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Attaches current category names to buckets; unknown or missing ids become
/// "Uncategorized".
pub(crate) async fn name_buckets<C>(conn: &C, buckets: Vec<Bucket>) -> Result<Vec<CategoryAmount>>
where
    C: ConnectionTrait,
{
    let names =
        category::resolve_category_names(conn, buckets.iter().filter_map(|b| b.category_id))
            .await?;
    Ok(buckets
        .into_iter()
        .map(|b| CategoryAmount {
            entry_type: b.transaction_type,
            category_name: category::display_name(&names, b.category_id),
            category_id: b.category_id,
            amount: b.total,
        })
        .collect())
}

/// Total of the buckets with the given type.
pub(crate) fn total_of(entries: &[CategoryAmount], entry_type: TransactionType) -> i64 {
    entries
        .iter()
        .filter(|e| e.entry_type == entry_type)
        .map(|e| e.amount)
        .sum()
}

/// Rebuilds the summary for one user and day.
///
/// The prior summary is removed first. Returns `None` when the user has no alive
/// income or expense dated on that day, in which case no summary is stored.
///
/// # Errors
/// Returns the store error or `Error::Timeout`; the replacement is rolled back.
#[instrument(skip(ledger))]
pub async fn build_for_user(
    ledger: &Ledger,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<daily_summary::Model>> {
    store::with_deadline(
        "build_daily_summary",
        ledger.store_timeout,
        build_in_session(ledger, user_id, date),
    )
    .await
}

async fn build_in_session(
    ledger: &Ledger,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<daily_summary::Model>> {
    let (start, end) = time::day_window(date, &ledger.zone)?;
    let txn = ledger.database.begin().await?;

    let previous = get_daily_summary(&txn, user_id, date).await?;
    DailySummary::delete_many()
        .filter(daily_summary::Column::UserId.eq(user_id))
        .filter(daily_summary::Column::Date.eq(date))
        .exec(&txn)
        .await?;

    let buckets = aggregate(&txn, user_id, start, Some(end)).await?;
    if buckets.is_empty() {
        txn.commit().await?;
        return Ok(None);
    }
    let breakdown = name_buckets(&txn, buckets).await?;

    let summary = daily_summary::ActiveModel {
        user_id: Set(user_id.to_string()),
        date: Set(date),
        total_income: Set(total_of(&breakdown, TransactionType::Income)),
        total_expense: Set(total_of(&breakdown, TransactionType::Expense)),
        category_breakdown: Set(CategoryBreakdown(breakdown)),
        created_at: Set(previous.map_or_else(|| ledger.now(), |p| p.created_at)),
        updated_at: Set(ledger.now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(Some(summary))
}

/// Builds summaries for every user with alive transactions dated on `date`, and
/// for every user already holding a summary for `date` so that days emptied by
/// cancellations lose their stale row.
///
/// A failure for one user is logged and counted; the remaining users are still
/// processed.
///
/// # Errors
/// Returns an error only if the set of active users cannot be read.
#[instrument(skip(ledger))]
pub async fn build_for_date(ledger: &Ledger, date: NaiveDate) -> Result<SummaryRunReport> {
    let (start, end) = time::day_window(date, &ledger.zone)?;
    let active: Vec<String> = store::find::<Transaction>(Visibility::Alive)
        .select_only()
        .column(transaction::Column::UserId)
        .distinct()
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lt(end))
        .into_tuple()
        .all(&ledger.database)
        .await?;
    let summarized: Vec<String> = DailySummary::find()
        .select_only()
        .column(daily_summary::Column::UserId)
        .filter(daily_summary::Column::Date.eq(date))
        .into_tuple()
        .all(&ledger.database)
        .await?;
    let users: BTreeSet<String> = active.into_iter().chain(summarized).collect();

    let mut report = SummaryRunReport {
        date,
        users_processed: 0,
        users_failed: 0,
    };
    for user_id in &users {
        match build_for_user(ledger, user_id, date).await {
            Ok(_) => report.users_processed += 1,
            Err(e) => {
                report.users_failed += 1;
                error!(user_id = %user_id, %date, error = %e, "Daily summary build failed");
            }
        }
    }

    info!(
        %date,
        users_processed = report.users_processed,
        users_failed = report.users_failed,
        "Daily summaries built"
    );
    Ok(report)
}

/// Builds summaries for each day in `from..=to`.
///
/// # Errors
/// Returns `Error::InvalidInput` if `from` is after `to`, or the first error from
/// [`build_for_date`].
pub async fn backfill(ledger: &Ledger, from: NaiveDate, to: NaiveDate) -> Result<Vec<SummaryRunReport>> {
    if from > to {
        return Err(Error::invalid(format!(
            "Backfill start {from} is after its end {to}"
        )));
    }

    let mut reports = Vec::new();
    for date in from.iter_days().take_while(|day| *day <= to) {
        reports.push(build_for_date(ledger, date).await?);
    }
    Ok(reports)
}

/// Builds every user's summary for the day before today in the users' zone.
///
/// # Errors
/// Same as [`build_for_date`].
pub async fn build_yesterday(ledger: &Ledger) -> Result<SummaryRunReport> {
    let yesterday = ledger
        .today()?
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| Error::Internal {
            message: "No calendar day before today".to_string(),
        })?;
    build_for_date(ledger, yesterday).await
}

/// Loads the stored summary for `(user, date)`.
pub async fn get_daily_summary<C>(
    db: &C,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<daily_summary::Model>>
where
    C: ConnectionTrait,
{
    DailySummary::find()
        .filter(daily_summary::Column::UserId.eq(user_id))
        .filter(daily_summary::Column::Date.eq(date))
        .one(db)
        .await
        .map_err(Into::into)
}
