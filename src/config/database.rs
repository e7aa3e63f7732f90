//! Database configuration module for the ledger store.
//!
//! This module handles `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`; the secondary indexes the core relies on for
//! correctness (the unique daily summary key and the single-main-pocket rule) are
//! created alongside them.

use crate::entities::{
    Allocation, AllocationLog, Category, DailySummary, Pocket, Transaction, UserPlatform,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_date
        ON transactions(user_id, date DESC)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_summaries_user_date
        ON daily_summaries(user_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_pockets_user
        ON pockets(user_id, deleted_at)",
    "CREATE INDEX IF NOT EXISTS idx_user_platforms_user
        ON user_platforms(user_id, deleted_at)",
    "CREATE INDEX IF NOT EXISTS idx_allocations_user
        ON allocations(user_id, deleted_at)",
    "CREATE INDEX IF NOT EXISTS idx_allocation_logs_allocation
        ON allocation_logs(allocation_id)",
    // At most one alive main pocket per user
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_pockets_single_main
        ON pockets(user_id)
        WHERE pocket_type = 'main' AND deleted_at IS NULL",
];

/// Establishes a connection to the configured database.
///
/// # Errors
/// Returns an error if the connection cannot be established.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database: {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all ledger tables and indexes if they do not already exist.
///
/// # Errors
/// Returns an error if any DDL statement fails.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_table(db, Pocket).await?;
    create_table(db, UserPlatform).await?;
    create_table(db, Category).await?;
    create_table(db, Allocation).await?;
    create_table(db, AllocationLog).await?;
    create_table(db, Transaction).await?;
    create_table(db, DailySummary).await?;

    for statement in INDEXES {
        db.execute_unprepared(statement).await?;
    }

    info!("Ledger tables and indexes ensured");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;
    Ok(())
}
