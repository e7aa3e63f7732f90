//! Pocket business logic - Handles pocket management under the pocket invariants.
//!
//! - At most one alive `main` pocket per user; it cannot be renamed or deleted.
//! - `system` pockets are created locked and cannot be unlocked.
//! - Locked pockets reject user-scope changes.
//!
//! Balances are never written here; see [`crate::core::balance`].

use crate::{
    core::store::{self, Visibility},
    entities::{Pocket, PocketType, pocket},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Arguments for creating a pocket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPocket {
    /// Display name
    pub name: String,
    /// Pocket kind
    pub pocket_type: PocketType,
    /// Optional category reference
    pub category_id: Option<i64>,
    /// Optional savings target in minor units
    pub target_balance: Option<i64>,
    /// Whether this is the default pocket
    pub is_default: bool,
}

impl NewPocket {
    /// A pocket of the given kind with no category, target, or default flag.
    #[must_use]
    pub fn new(name: impl Into<String>, pocket_type: PocketType) -> Self {
        Self {
            name: name.into(),
            pocket_type,
            category_id: None,
            target_balance: None,
            is_default: false,
        }
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid("Pocket name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_target(target: Option<i64>) -> Result<()> {
    match target {
        Some(amount) if amount < 0 => Err(Error::InvalidAmount { amount }),
        _ => Ok(()),
    }
}

/// Creates a pocket with a zero balance.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or the target is negative
/// - The user already has an alive `main` pocket (`Error::Conflict`)
/// - The database insert fails
pub async fn create_pocket<C>(
    db: &C,
    user_id: &str,
    new: NewPocket,
    now: DateTime<Utc>,
) -> Result<pocket::Model>
where
    C: ConnectionTrait,
{
    let name = validate_name(&new.name)?;
    validate_target(new.target_balance)?;

    if new.pocket_type == PocketType::Main && get_main_pocket(db, user_id).await?.is_some() {
        return Err(Error::Conflict {
            message: format!("User {user_id} already has a main pocket"),
        });
    }

    let pocket = pocket::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        pocket_type: Set(new.pocket_type),
        category_id: Set(new.category_id),
        balance: Set(0),
        target_balance: Set(new.target_balance),
        is_default: Set(new.is_default),
        is_active: Set(true),
        is_locked: Set(new.pocket_type == PocketType::System),
        last_use_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    };

    let created = pocket.insert(db).await?;
    info!(user_id, pocket_id = created.id, pocket_type = ?created.pocket_type, "Pocket created");
    Ok(created)
}

/// Loads an alive pocket owned by `user_id`.
///
/// # Errors
/// Returns `Error::NotFound` if the pocket is absent, deleted, or foreign.
pub async fn get_pocket<C>(db: &C, user_id: &str, pocket_id: i64) -> Result<pocket::Model>
where
    C: ConnectionTrait,
{
    store::get_owned::<Pocket, _>(db, "pocket", user_id, pocket_id).await
}

/// Finds the user's alive main pocket, if any.
pub async fn get_main_pocket<C>(db: &C, user_id: &str) -> Result<Option<pocket::Model>>
where
    C: ConnectionTrait,
{
    store::find_for_user::<Pocket>(user_id, Visibility::Alive)
        .filter(pocket::Column::PocketType.eq(PocketType::Main))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the user's alive pockets, main first, then by name.
pub async fn list_pockets<C>(db: &C, user_id: &str) -> Result<Vec<pocket::Model>>
where
    C: ConnectionTrait,
{
    let mut pockets = store::find_for_user::<Pocket>(user_id, Visibility::Alive)
        .order_by_asc(pocket::Column::Name)
        .all(db)
        .await?;
    pockets.sort_by_key(|p| p.pocket_type != PocketType::Main);
    Ok(pockets)
}

fn ensure_user_mutable(pocket: &pocket::Model) -> Result<()> {
    if pocket.is_locked {
        return Err(Error::forbidden(format!("Pocket '{}' is locked", pocket.name)));
    }
    Ok(())
}

/// Renames a pocket.
///
/// # Errors
/// Returns `Error::Forbidden` for main or locked pockets, `Error::NotFound` if the
/// pocket is not the user's.
pub async fn rename_pocket<C>(
    db: &C,
    user_id: &str,
    pocket_id: i64,
    new_name: &str,
    now: DateTime<Utc>,
) -> Result<pocket::Model>
where
    C: ConnectionTrait,
{
    let name = validate_name(new_name)?;
    let pocket = get_pocket(db, user_id, pocket_id).await?;
    if pocket.pocket_type == PocketType::Main {
        return Err(Error::forbidden("The main pocket cannot be renamed"));
    }
    ensure_user_mutable(&pocket)?;

    let mut active: pocket::ActiveModel = pocket.into();
    active.name = Set(name);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Locks or unlocks a pocket.
///
/// # Errors
/// Returns `Error::Forbidden` when unlocking a system pocket.
pub async fn set_pocket_locked<C>(
    db: &C,
    user_id: &str,
    pocket_id: i64,
    locked: bool,
    now: DateTime<Utc>,
) -> Result<pocket::Model>
where
    C: ConnectionTrait,
{
    let pocket = get_pocket(db, user_id, pocket_id).await?;
    if pocket.pocket_type == PocketType::System && !locked {
        return Err(Error::forbidden("System pockets are always locked"));
    }

    let mut active: pocket::ActiveModel = pocket.into();
    active.is_locked = Set(locked);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Sets or clears a pocket's savings target.
///
/// # Errors
/// Returns an error for negative targets, locked pockets, or foreign pockets.
pub async fn set_pocket_target<C>(
    db: &C,
    user_id: &str,
    pocket_id: i64,
    target_balance: Option<i64>,
    now: DateTime<Utc>,
) -> Result<pocket::Model>
where
    C: ConnectionTrait,
{
    validate_target(target_balance)?;
    let pocket = get_pocket(db, user_id, pocket_id).await?;
    ensure_user_mutable(&pocket)?;

    let mut active: pocket::ActiveModel = pocket.into();
    active.target_balance = Set(target_balance);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Activates or deactivates a pocket. The main pocket always stays active.
///
/// # Errors
/// Returns `Error::Forbidden` for deactivating main or touching locked pockets.
pub async fn set_pocket_active<C>(
    db: &C,
    user_id: &str,
    pocket_id: i64,
    is_active: bool,
    now: DateTime<Utc>,
) -> Result<pocket::Model>
where
    C: ConnectionTrait,
{
    let pocket = get_pocket(db, user_id, pocket_id).await?;
    if pocket.pocket_type == PocketType::Main && !is_active {
        return Err(Error::forbidden("The main pocket cannot be deactivated"));
    }
    ensure_user_mutable(&pocket)?;

    let mut active: pocket::ActiveModel = pocket.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Soft-deletes a pocket.
///
/// # Errors
/// Returns `Error::Forbidden` for main or locked pockets.
pub async fn delete_pocket<C>(
    db: &C,
    user_id: &str,
    pocket_id: i64,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let pocket = get_pocket(db, user_id, pocket_id).await?;
    if pocket.pocket_type == PocketType::Main {
        return Err(Error::forbidden("The main pocket cannot be deleted"));
    }
    ensure_user_mutable(&pocket)?;

    let mut active: pocket::ActiveModel = pocket.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;
    info!(user_id, pocket_id, "Pocket deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_pocket_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_pocket(
            &db,
            "alice",
            NewPocket::new("   ", PocketType::Saving),
            fixture_time(),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::InvalidInput { .. }));

        let mut negative = NewPocket::new("Trip", PocketType::Saving);
        negative.target_balance = Some(-1);
        let result = create_pocket(&db, "alice", negative, fixture_time()).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { amount: -1 }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_pocket_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let pocket = create_test_pocket(&db, "alice", "  Groceries ", PocketType::Saving).await?;

        assert_eq!(pocket.name, "Groceries");
        assert_eq!(pocket.balance, 0);
        assert!(pocket.is_active);
        assert!(!pocket.is_locked);
        assert!(pocket.deleted_at.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_mutations_stamp_the_ledger_clock() -> Result<()> {
        use chrono::{Duration, TimeZone};

        let start = Utc.with_ymd_and_hms(2031, 2, 3, 4, 5, 6).unwrap();
        let ledger = setup_ledger(start).await?;
        let db = &ledger.database;
        let pocket = create_test_pocket(db, "alice", "Trip", PocketType::Saving).await?;
        assert_eq!(pocket.created_at, fixture_time());

        let renamed = rename_pocket(db, "alice", pocket.id, "Holiday", ledger.now()).await?;
        assert_eq!(renamed.updated_at, start);
        assert_eq!(renamed.created_at, fixture_time());

        ledger.clock.advance(Duration::hours(2));
        delete_pocket(db, "alice", pocket.id, ledger.now()).await?;
        let deleted = reload_pocket(db, pocket.id).await?;
        assert_eq!(deleted.deleted_at, Some(start + Duration::hours(2)));

        Ok(())
    }

    #[tokio::test]
    async fn test_single_main_pocket_per_user() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_pocket(&db, "alice", "Main", PocketType::Main).await?;

        let err = create_test_pocket(&db, "alice", "Main 2", PocketType::Main)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Another user gets their own main pocket
        create_test_pocket(&db, "bob", "Main", PocketType::Main).await?;

        let mains = store::find::<Pocket>(Visibility::Alive)
            .filter(pocket::Column::UserId.eq("alice"))
            .filter(pocket::Column::PocketType.eq(PocketType::Main))
            .count(&db)
            .await?;
        assert_eq!(mains, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_unique_index_backs_single_main_rule() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_pocket(&db, "alice", "Main", PocketType::Main).await?;

        // Bypass the service check and hit the partial unique index directly
        let now = fixture_time();
        let duplicate = pocket::ActiveModel {
            user_id: Set("alice".to_string()),
            name: Set("Sneaky".to_string()),
            pocket_type: Set(PocketType::Main),
            category_id: Set(None),
            balance: Set(0),
            target_balance: Set(None),
            is_default: Set(false),
            is_active: Set(true),
            is_locked: Set(false),
            last_use_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };
        let err: Error = duplicate.insert(&db).await.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        Ok(())
    }

    #[tokio::test]
    async fn test_main_pocket_is_protected() -> Result<()> {
        let db = setup_test_db().await?;
        let main = create_test_pocket(&db, "alice", "Main", PocketType::Main).await?;

        let err = rename_pocket(&db, "alice", main.id, "Other", fixture_time()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = delete_pocket(&db, "alice", main.id, fixture_time()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = set_pocket_active(
            &db,
            "alice",
            main.id,
            false,
            fixture_time(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let still_there = get_pocket(&db, "alice", main.id).await?;
        assert_eq!(still_there.name, "Main");

        Ok(())
    }

    #[tokio::test]
    async fn test_system_pocket_always_locked() -> Result<()> {
        let db = setup_test_db().await?;
        let system = create_test_pocket(&db, "alice", "Reserve", PocketType::System).await?;
        assert!(system.is_locked);

        let err = set_pocket_locked(
            &db,
            "alice",
            system.id,
            false,
            fixture_time(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = rename_pocket(&db, "alice", system.id, "Mine", fixture_time()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        Ok(())
    }

    #[tokio::test]
    async fn test_lock_and_unlock_regular_pocket() -> Result<()> {
        let db = setup_test_db().await?;
        let saving = create_test_pocket(&db, "alice", "Trip", PocketType::Saving).await?;

        let locked = set_pocket_locked(&db, "alice", saving.id, true, fixture_time()).await?;
        assert!(locked.is_locked);
        assert!(delete_pocket(&db, "alice", saving.id, fixture_time()).await.is_err());

        let unlocked = set_pocket_locked(&db, "alice", saving.id, false, fixture_time()).await?;
        assert!(!unlocked.is_locked);
        delete_pocket(&db, "alice", saving.id, fixture_time()).await?;

        let err = get_pocket(&db, "alice", saving.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        Ok(())
    }

    #[tokio::test]
    async fn test_main_pocket_listed_first() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_pocket(&db, "alice", "Main", PocketType::Main).await?;
        let main = get_main_pocket(&db, "alice").await?.unwrap();
        assert_eq!(main.pocket_type, PocketType::Main);

        let listed = list_pockets(&db, "alice").await?;
        assert_eq!(listed[0].id, main.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_pocket_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let bobs = create_test_pocket(&db, "bob", "Trip", PocketType::Saving).await?;

        let err = rename_pocket(&db, "alice", bobs.id, "Mine", fixture_time()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = set_pocket_target(
            &db,
            "alice",
            bobs.id,
            Some(100),
            fixture_time(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        Ok(())
    }
}
