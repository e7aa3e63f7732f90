//! Daily summary entity - Materialized per-user, per-day income/expense totals.
//!
//! One row per `(user_id, date)` where `date` is the calendar day in the configured
//! zone. The category breakdown is stored as JSON with names resolved at build time.
//! Rows are replaced on rebuild and hard-deleted when a day empties out, so there is
//! no `deleted_at` column.

use super::transaction::TransactionType;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One `(type, category)` bucket of a day's activity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAmount {
    /// Income or expense
    pub entry_type: TransactionType,
    /// Category id, `None` for uncategorized
    pub category_id: Option<i64>,
    /// Category name at build time
    pub category_name: String,
    /// Sum in minor units
    pub amount: i64,
}

/// JSON column holding the per-category breakdown
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CategoryBreakdown(pub Vec<CategoryAmount>);

/// Daily summary database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_summaries")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Calendar day in the configured zone
    pub date: Date,
    /// Sum of alive income transactions dated on this day
    pub total_income: i64,
    /// Sum of alive expense transactions dated on this day
    pub total_expense: i64,
    /// Per-category sums
    #[sea_orm(column_type = "Json")]
    pub category_breakdown: CategoryBreakdown,
    /// When the summary for this day was first built
    pub created_at: DateTimeUtc,
    /// When the summary was last rebuilt
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
