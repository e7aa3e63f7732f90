//! Pocket entity - A user's named virtual sub-account.
//!
//! Each user has exactly one alive `main` pocket plus any number of allocation,
//! saving, debt and system pockets. Balances are held in minor units.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of pocket; drives which management operations are permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum PocketType {
    /// The single privileged pocket; undeletable and non-renamable
    #[sea_orm(string_value = "main")]
    Main,
    /// Pocket fed by an allocation rule
    #[sea_orm(string_value = "allocation")]
    Allocation,
    /// Savings goal pocket
    #[sea_orm(string_value = "saving")]
    Saving,
    /// Debt pocket; allowed to go negative
    #[sea_orm(string_value = "debt")]
    Debt,
    /// Internal pocket; always locked
    #[sea_orm(string_value = "system")]
    System,
}

/// Pocket database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pockets")]
pub struct Model {
    /// Unique identifier for the pocket
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Pocket kind
    pub pocket_type: PocketType,
    /// Optional category reference
    pub category_id: Option<i64>,
    /// Current balance in minor units; written only by the balance processor
    pub balance: i64,
    /// Optional savings target in minor units
    pub target_balance: Option<i64>,
    /// Whether this is the user's default pocket
    pub is_default: bool,
    /// Inactive pockets cannot take part in new transactions
    pub is_active: bool,
    /// Locked pockets reject user-scope mutations
    pub is_locked: bool,
    /// Last time a transaction touched this pocket
    pub last_use_at: Option<DateTimeUtc>,
    /// When the pocket was created
    pub created_at: DateTimeUtc,
    /// When the pocket was last modified
    pub updated_at: DateTimeUtc,
    /// Soft delete tombstone
    pub deleted_at: Option<DateTimeUtc>,
}

/// Pockets are referenced by transactions by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
