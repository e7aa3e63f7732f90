//! Transaction entity - Immutable-by-convention ledger event.
//!
//! Each transaction has a type, a positive `amount` in minor units, the business
//! `date` it happened on, and up to four participants (`pocket_from_id`,
//! `pocket_to_id`, `user_platform_from_id`, `user_platform_to_id`) whose allowed
//! combinations depend on the type. Cancellation sets `deleted_at`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger event type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money entering a pocket and/or user platform
    #[sea_orm(string_value = "income")]
    Income,
    /// Money leaving a pocket and/or user platform
    #[sea_orm(string_value = "expense")]
    Expense,
    /// Money moving between pockets and/or user platforms
    #[sea_orm(string_value = "transfer")]
    Transfer,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Event type
    pub transaction_type: TransactionType,
    /// Strictly positive amount in minor units
    pub amount: i64,
    /// Business date of the event; authoritative for summaries and charts
    pub date: DateTimeUtc,
    /// Source pocket
    pub pocket_from_id: Option<i64>,
    /// Destination pocket
    pub pocket_to_id: Option<i64>,
    /// Source user platform
    pub user_platform_from_id: Option<i64>,
    /// Destination user platform
    pub user_platform_to_id: Option<i64>,
    /// Optional category reference
    pub category_id: Option<i64>,
    /// Free-form note
    pub note: Option<String>,
    /// External reference (e.g. receipt number)
    pub reference: Option<String>,
    /// When the transaction was persisted
    pub created_at: DateTimeUtc,
    /// When the transaction was last modified
    pub updated_at: DateTimeUtc,
    /// Set when the transaction is cancelled
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
