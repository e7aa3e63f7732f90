//! Entity module - Contains all SeaORM entity definitions for the ledger.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod allocation;
pub mod allocation_log;
pub mod category;
pub mod daily_summary;
pub mod pocket;
pub mod transaction;
pub mod user_platform;

use sea_orm::EntityTrait;

// Re-export specific types to avoid conflicts
pub use allocation::{
    Column as AllocationColumn, Entity as Allocation, Model as AllocationModel,
};
pub use allocation_log::{
    Column as AllocationLogColumn, Entity as AllocationLog, Model as AllocationLogModel,
};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use daily_summary::{
    CategoryAmount, CategoryBreakdown, Column as DailySummaryColumn, Entity as DailySummary,
    Model as DailySummaryModel,
};
pub use pocket::{Column as PocketColumn, Entity as Pocket, Model as PocketModel, PocketType};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionType,
};
pub use user_platform::{
    Column as UserPlatformColumn, Entity as UserPlatform, Model as UserPlatformModel,
};

/// Entities carrying a `deleted_at` tombstone.
///
/// A row is "alive" while its tombstone column is `NULL`.
pub trait SoftDelete: EntityTrait {
    /// The nullable tombstone column
    fn deleted_at_column() -> Self::Column;
    /// The owning user column
    fn user_id_column() -> Self::Column;
    /// The integer primary key column
    fn id_column() -> Self::Column;
}

macro_rules! soft_delete {
    ($module:ident) => {
        impl SoftDelete for $module::Entity {
            fn deleted_at_column() -> Self::Column {
                $module::Column::DeletedAt
            }

            fn user_id_column() -> Self::Column {
                $module::Column::UserId
            }

            fn id_column() -> Self::Column {
                $module::Column::Id
            }
        }
    };
}

soft_delete!(allocation);
soft_delete!(category);
soft_delete!(pocket);
soft_delete!(transaction);
soft_delete!(user_platform);
