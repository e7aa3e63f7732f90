//! User platform business logic - the user's accounts at banks, e-wallets, cash and ATMs.
//!
//! Balances are never written here; see [`crate::core::balance`].

use crate::{
    core::store::{self, Visibility},
    entities::{UserPlatform, user_platform},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Registers a user platform with a zero balance.
///
/// # Errors
/// Returns an error if the alias is blank or the insert fails.
pub async fn create_user_platform<C>(
    db: &C,
    user_id: &str,
    platform_id: i64,
    alias_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<user_platform::Model>
where
    C: ConnectionTrait,
{
    let alias_name = normalize_alias(alias_name)?;
    let record = user_platform::ActiveModel {
        user_id: Set(user_id.to_string()),
        platform_id: Set(platform_id),
        alias_name: Set(alias_name),
        balance: Set(0),
        is_active: Set(true),
        last_use_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    };

    let created = record.insert(db).await?;
    info!(user_id, user_platform_id = created.id, platform_id, "User platform created");
    Ok(created)
}

fn normalize_alias(alias_name: Option<String>) -> Result<Option<String>> {
    match alias_name {
        Some(alias) if alias.trim().is_empty() => {
            Err(Error::invalid("Platform alias cannot be blank"))
        }
        Some(alias) => Ok(Some(alias.trim().to_string())),
        None => Ok(None),
    }
}

/// Loads an alive user platform owned by `user_id`.
///
/// # Errors
/// Returns `Error::NotFound` if absent, deleted, or foreign.
pub async fn get_user_platform<C>(
    db: &C,
    user_id: &str,
    user_platform_id: i64,
) -> Result<user_platform::Model>
where
    C: ConnectionTrait,
{
    store::get_owned::<UserPlatform, _>(db, "user platform", user_id, user_platform_id).await
}

/// Lists the user's alive platforms, most recently used first.
pub async fn list_user_platforms<C>(db: &C, user_id: &str) -> Result<Vec<user_platform::Model>>
where
    C: ConnectionTrait,
{
    store::find_for_user::<UserPlatform>(user_id, Visibility::Alive)
        .order_by_desc(user_platform::Column::LastUseAt)
        .order_by_asc(user_platform::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Changes the display alias.
///
/// # Errors
/// Returns an error if the alias is blank or the platform is not the user's.
pub async fn rename_user_platform<C>(
    db: &C,
    user_id: &str,
    user_platform_id: i64,
    alias_name: Option<String>,
    now: DateTime<Utc>,
) -> Result<user_platform::Model>
where
    C: ConnectionTrait,
{
    let alias_name = normalize_alias(alias_name)?;
    let record = get_user_platform(db, user_id, user_platform_id).await?;
    let mut active: user_platform::ActiveModel = record.into();
    active.alias_name = Set(alias_name);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Activates or deactivates a platform; inactive platforms cannot take part in
/// new transactions.
///
/// # Errors
/// Returns `Error::NotFound` if the platform is not the user's.
pub async fn set_user_platform_active<C>(
    db: &C,
    user_id: &str,
    user_platform_id: i64,
    is_active: bool,
    now: DateTime<Utc>,
) -> Result<user_platform::Model>
where
    C: ConnectionTrait,
{
    let record = get_user_platform(db, user_id, user_platform_id).await?;
    let mut active: user_platform::ActiveModel = record.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Soft-deletes a platform.
///
/// # Errors
/// Returns `Error::NotFound` if the platform is not the user's.
pub async fn delete_user_platform<C>(
    db: &C,
    user_id: &str,
    user_platform_id: i64,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let record = get_user_platform(db, user_id, user_platform_id).await?;
    let mut active: user_platform::ActiveModel = record.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(())
}
