//! Category business logic - creation, renames, and name resolution for breakdowns.

use crate::{
    core::store::{self, Visibility},
    entities::{Category, TransactionType, category},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*};
use std::collections::HashMap;

/// Label used for transactions without a resolvable category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Creates a category for income or expense transactions.
///
/// # Errors
/// Returns `Error::InvalidInput` for blank names or transfer categories.
pub async fn create_category<C>(
    db: &C,
    user_id: &str,
    name: &str,
    category_type: TransactionType,
    now: DateTime<Utc>,
) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid("Category name cannot be empty"));
    }
    if category_type == TransactionType::Transfer {
        return Err(Error::invalid("Categories label income or expense only"));
    }

    category::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name.to_string()),
        category_type: Set(category_type),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Loads an alive category owned by `user_id`.
///
/// # Errors
/// Returns `Error::NotFound` if absent, deleted, or foreign.
pub async fn get_category<C>(db: &C, user_id: &str, category_id: i64) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    store::get_owned::<Category, _>(db, "category", user_id, category_id).await
}

/// Renames a category. Existing daily summaries keep the old name.
///
/// # Errors
/// Returns an error for blank names or foreign categories.
pub async fn rename_category<C>(
    db: &C,
    user_id: &str,
    category_id: i64,
    new_name: &str,
    now: DateTime<Utc>,
) -> Result<category::Model>
where
    C: ConnectionTrait,
{
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(Error::invalid("Category name cannot be empty"));
    }
    let existing = get_category(db, user_id, category_id).await?;
    let mut active: category::ActiveModel = existing.into();
    active.name = Set(new_name.to_string());
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Resolves category ids to their current names.
///
/// Deleted categories still resolve so that history keeps a label; ids that do
/// not exist are simply absent from the map.
pub async fn resolve_category_names<C>(
    db: &C,
    ids: impl IntoIterator<Item = i64>,
) -> Result<HashMap<i64, String>>
where
    C: ConnectionTrait,
{
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let categories = store::find::<Category>(Visibility::IncludeDeleted)
        .filter(category::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(categories.into_iter().map(|c| (c.id, c.name)).collect())
}

/// Name to display for an optional category id.
#[must_use]
pub fn display_name(names: &HashMap<i64, String>, category_id: Option<i64>) -> String {
    category_id
        .and_then(|id| names.get(&id).cloned())
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}
