//! Allocation entity - A priority-ranked rule that takes a percentage of every
//! income event into a named bucket, optionally capped by a target.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Allocation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Display name of the bucket
    pub name: String,
    /// Distribution order; lower runs first, minimum 1
    pub priority: i32,
    /// Share of each income event, `0 < percentage <= 100`
    pub percentage: f64,
    /// Amount distributed so far in minor units
    pub current_amount: i64,
    /// Optional cap in minor units
    pub target_amount: Option<i64>,
    /// Inactive allocations are skipped during distribution
    pub is_active: bool,
    /// When the allocation was created; breaks priority ties
    pub created_at: DateTimeUtc,
    /// When the allocation was last modified
    pub updated_at: DateTimeUtc,
    /// Soft delete tombstone
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between Allocation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One allocation has many distribution logs
    #[sea_orm(has_many = "super::allocation_log::Entity")]
    Logs,
}

impl Related<super::allocation_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Logs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
