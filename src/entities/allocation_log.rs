//! Allocation log entity - Append-only audit record of one allocation's share of
//! one income transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Allocation log database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocation_logs")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Allocation that received the share
    pub allocation_id: i64,
    /// Income transaction being distributed
    pub transaction_id: i64,
    /// Full income amount in minor units
    pub income_amount: i64,
    /// Share credited to the allocation in minor units
    pub allocated_amount: i64,
    /// Allocation percentage at distribution time
    pub percentage: f64,
    /// Allocation priority at distribution time
    pub priority: i32,
    /// When the share was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `AllocationLog` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each log belongs to one allocation
    #[sea_orm(
        belongs_to = "super::allocation::Entity",
        from = "Column::AllocationId",
        to = "super::allocation::Column::Id"
    )]
    Allocation,
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
