//! Shared test utilities for the ledger core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        Ledger, allocation, balance, pocket, time::TimeSource, transaction::NewTransaction,
        user_platform,
    },
    entities::{self, Pocket, PocketType, TransactionType, UserPlatform},
    errors::{Error, Result},
};
use chrono::{DateTime, TimeZone as _, Utc};
use jiff::tz::TimeZone;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::time::Duration;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Zone used by every test ledger (UTC+7, no DST)
pub fn test_zone() -> TimeZone {
    TimeZone::get("Asia/Jakarta").unwrap()
}

/// Fixed instant stamped on fixtures created outside a ledger
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Builds a ledger over `db` with the clock pinned at `now`.
pub fn test_ledger(db: DatabaseConnection, now: DateTime<Utc>) -> Ledger {
    Ledger {
        database: db,
        clock: TimeSource::pinned(now),
        zone: test_zone(),
        store_timeout: Duration::from_secs(10),
    }
}

/// Sets up a database and a ledger pinned at `now`.
pub async fn setup_ledger(now: DateTime<Utc>) -> Result<Ledger> {
    let db = setup_test_db().await?;
    Ok(test_ledger(db, now))
}

/// Creates a pocket with no category, target, or default flag.
pub async fn create_test_pocket(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    pocket_type: PocketType,
) -> Result<entities::pocket::Model> {
    pocket::create_pocket(
        db,
        user_id,
        pocket::NewPocket::new(name, pocket_type),
        fixture_time(),
    )
    .await
}

/// Creates an active user platform for platform id 1 without an alias.
pub async fn create_test_user_platform(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<entities::user_platform::Model> {
    user_platform::create_user_platform(db, user_id, 1, None, fixture_time()).await
}

/// Creates an active allocation rule.
pub async fn create_test_allocation(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    priority: i32,
    percentage: f64,
    target_amount: Option<i64>,
) -> Result<entities::allocation::Model> {
    allocation::create_allocation(
        db,
        user_id,
        allocation::NewAllocation {
            name: name.to_string(),
            priority,
            percentage,
            target_amount,
        },
        fixture_time(),
    )
    .await
}

/// Seeds a pocket balance through the balance processor.
pub async fn fund_pocket(db: &DatabaseConnection, pocket_id: i64, amount: i64) -> Result<()> {
    let event = balance::BalanceEvent {
        transaction_type: TransactionType::Income,
        amount,
        pocket_from: None,
        pocket_to: Some(pocket_id),
        user_platform_from: None,
        user_platform_to: None,
    };
    balance::apply(db, &event, fixture_time()).await
}

/// Seeds a user platform balance through the balance processor.
pub async fn fund_user_platform(
    db: &DatabaseConnection,
    user_platform_id: i64,
    amount: i64,
) -> Result<()> {
    let event = balance::BalanceEvent {
        transaction_type: TransactionType::Income,
        amount,
        pocket_from: None,
        pocket_to: None,
        user_platform_from: None,
        user_platform_to: Some(user_platform_id),
    };
    balance::apply(db, &event, fixture_time()).await
}

/// Reads a pocket regardless of tombstone.
pub async fn reload_pocket(
    db: &DatabaseConnection,
    pocket_id: i64,
) -> Result<entities::pocket::Model> {
    Pocket::find_by_id(pocket_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("pocket", pocket_id))
}

/// Reads a user platform regardless of tombstone.
pub async fn reload_user_platform(
    db: &DatabaseConnection,
    user_platform_id: i64,
) -> Result<entities::user_platform::Model> {
    UserPlatform::find_by_id(user_platform_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user platform", user_platform_id))
}

/// Income event into a pocket and/or a user platform.
pub fn income(amount: i64, pocket_to: Option<i64>, user_platform_to: Option<i64>) -> NewTransaction {
    NewTransaction {
        pocket_to,
        user_platform_to,
        ..NewTransaction::new(TransactionType::Income, amount)
    }
}

/// Expense event from a pocket and/or a user platform.
pub fn expense(
    amount: i64,
    pocket_from: Option<i64>,
    user_platform_from: Option<i64>,
) -> NewTransaction {
    NewTransaction {
        pocket_from,
        user_platform_from,
        ..NewTransaction::new(TransactionType::Expense, amount)
    }
}

/// Pocket-to-pocket transfer event.
pub fn pocket_transfer(amount: i64, pocket_from: i64, pocket_to: i64) -> NewTransaction {
    NewTransaction {
        pocket_from: Some(pocket_from),
        pocket_to: Some(pocket_to),
        ..NewTransaction::new(TransactionType::Transfer, amount)
    }
}
