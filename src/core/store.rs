//! Ledger store adapter.
//!
//! Every query built here applies the "alive" predicate (`deleted_at IS NULL`) unless
//! the caller explicitly asks for [`Visibility::IncludeDeleted`]. Lookups by id are
//! also scoped to the owning user, so a foreign id is indistinguishable from a missing
//! one. Multi-document sessions are plain SeaORM transactions; [`with_deadline`]
//! bounds them so a stalled store aborts the session instead of hanging the caller.

use crate::entities::SoftDelete;
use crate::errors::{Error, Result};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Select};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Whether tombstoned rows are visible to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only rows with `deleted_at` unset
    #[default]
    Alive,
    /// Every row; reserved for admin and backfill paths
    IncludeDeleted,
}

/// Starts a query over `E` honouring `visibility`.
#[must_use]
pub fn find<E: SoftDelete>(visibility: Visibility) -> Select<E> {
    match visibility {
        Visibility::Alive => E::find().filter(E::deleted_at_column().is_null()),
        Visibility::IncludeDeleted => E::find(),
    }
}

/// Starts a query over the alive rows of `E` owned by `user_id`.
#[must_use]
pub fn find_for_user<E: SoftDelete>(user_id: &str, visibility: Visibility) -> Select<E> {
    find::<E>(visibility).filter(E::user_id_column().eq(user_id))
}

/// Loads an alive row of `E` owned by `user_id`.
///
/// # Errors
/// Returns `Error::NotFound` if the row is absent, deleted, or owned by another user.
pub async fn get_owned<E, C>(
    conn: &C,
    entity: &'static str,
    user_id: &str,
    id: i64,
) -> Result<E::Model>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    find_for_user::<E>(user_id, Visibility::Alive)
        .filter(E::id_column().eq(id))
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(entity, id))
}

/// Runs `operation` and fails with `Error::Timeout` if it outlives `deadline`.
///
/// The future is dropped on expiry; a SeaORM transaction owned by it rolls back when
/// dropped, so no partial state becomes visible.
///
/// # Errors
/// Returns the operation's own error, or `Error::Timeout`.
pub async fn with_deadline<T, F>(name: &'static str, deadline: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .unwrap_or_else(|_| {
            warn!(operation = name, ?deadline, "Store operation exceeded its deadline");
            Err(Error::Timeout {
                operation: name,
                seconds: deadline.as_secs(),
            })
        })
}
