//! User platform entity - A user's handle on an external account endpoint
//! (bank, e-wallet, cash, ATM) with its own balance.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User platform database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_platforms")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Reference to the platform catalogue entry
    pub platform_id: i64,
    /// User-chosen display name
    pub alias_name: Option<String>,
    /// Current balance in minor units; written only by the balance processor
    pub balance: i64,
    /// Only active platforms may take part in transactions
    pub is_active: bool,
    /// Last time a transaction touched this platform
    pub last_use_at: Option<DateTimeUtc>,
    /// When the record was created
    pub created_at: DateTimeUtc,
    /// When the record was last modified
    pub updated_at: DateTimeUtc,
    /// Soft delete tombstone
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
