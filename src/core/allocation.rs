//! Allocation business logic - distributes income across priority-ordered buckets.
//!
//! Each active allocation takes `percentage` of the *original* income (not of what is
//! left), capped by what remains of the income and by its own target. Whatever no
//! allocation claims is free cash. Distribution runs on the caller's session, so a
//! failure anywhere rolls back the income's balance effect as well.

use crate::{
    core::store::{self, Visibility},
    entities::{Allocation, AllocationLog, allocation, allocation_log},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Arguments for creating an allocation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAllocation {
    /// Display name
    pub name: String,
    /// Distribution order, minimum 1
    pub priority: i32,
    /// Share of each income, `0 < percentage <= 100`
    pub percentage: f64,
    /// Optional cap in minor units
    pub target_amount: Option<i64>,
}

/// Partial update of an allocation rule; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationUpdate {
    /// New display name
    pub name: Option<String>,
    /// New priority
    pub priority: Option<i32>,
    /// New percentage
    pub percentage: Option<f64>,
    /// New target; `Some(None)` clears it
    pub target_amount: Option<Option<i64>>,
}

/// One allocation's share of an income event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationShare {
    /// Allocation that received the share
    pub allocation_id: i64,
    /// Allocation name
    pub name: String,
    /// Allocation priority
    pub priority: i32,
    /// Allocation percentage
    pub percentage: f64,
    /// Amount credited in minor units
    pub allocated_amount: i64,
    /// Allocation total after the credit
    pub current_amount: i64,
    /// Allocation cap, if any
    pub target_amount: Option<i64>,
}

/// Outcome of distributing one income event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    /// Income transaction that was distributed
    pub transaction_id: i64,
    /// Full income amount
    pub total_income: i64,
    /// Sum of all shares
    pub total_distributed: i64,
    /// Part of the income no allocation claimed
    pub free_cash: i64,
    /// Shares in distribution order; allocations that received nothing are omitted
    pub allocations: Vec<AllocationShare>,
}

/// Ideal share of `amount` for `percentage`, rounded down to whole minor units.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn ideal_share(amount: i64, percentage: f64) -> i64 {
    ((amount as f64) * percentage / 100.0).floor() as i64
}

/// The part of an allocation rule that decides its share
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShareRule {
    percentage: f64,
    current_amount: i64,
    target_amount: Option<i64>,
}

impl From<&allocation::Model> for ShareRule {
    fn from(rule: &allocation::Model) -> Self {
        Self {
            percentage: rule.percentage,
            current_amount: rule.current_amount,
            target_amount: rule.target_amount,
        }
    }
}

/// Share of `amount` for each rule, in distribution order.
///
/// A rule gets its ideal share capped by what is left of the income and by the
/// room under its target. Rules at or over their target, or reached after the
/// income is used up, get zero.
fn plan_shares(amount: i64, rules: &[ShareRule]) -> Vec<i64> {
    let mut remaining = amount;
    rules
        .iter()
        .map(|rule| {
            if remaining <= 0 || rule.target_amount.is_some_and(|t| rule.current_amount >= t) {
                return 0;
            }
            let mut allocated = ideal_share(amount, rule.percentage).min(remaining);
            if let Some(target) = rule.target_amount {
                allocated = allocated.min(target - rule.current_amount);
            }
            let allocated = allocated.max(0);
            remaining -= allocated;
            allocated
        })
        .collect()
}

/// Distributes an income across the user's active allocations.
///
/// Allocations run in ascending `priority`, ties broken by `created_at` then `id`.
/// Writes one [`allocation_log`] row per nonzero share and increases each receiving
/// allocation's `current_amount`.
///
/// # Errors
/// Returns `Error::InvalidAmount` for non-positive income, `Error::Internal` if a
/// share would break an allocation's bounds, or the store error.
pub async fn distribute<C>(
    conn: &C,
    user_id: &str,
    transaction_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<DistributionSummary>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let allocations = list_active_allocations(conn, user_id).await?;
    let rules: Vec<ShareRule> = allocations.iter().map(ShareRule::from).collect();
    let planned = plan_shares(amount, &rules);
    let mut shares = Vec::new();

    for (rule, allocated) in allocations.into_iter().zip(planned) {
        if rule.target_amount.is_some_and(|target| rule.current_amount >= target) {
            debug!(allocation_id = rule.id, "Allocation already at target, skipping");
            continue;
        }
        if allocated == 0 {
            continue;
        }

        let current_amount = rule.current_amount + allocated;
        if current_amount < 0 || rule.target_amount.is_some_and(|target| current_amount > target) {
            return Err(Error::Internal {
                message: format!(
                    "Allocation {} would move to {current_amount} outside its bounds",
                    rule.id
                ),
            });
        }

        allocation_log::ActiveModel {
            user_id: Set(user_id.to_string()),
            allocation_id: Set(rule.id),
            transaction_id: Set(transaction_id),
            income_amount: Set(amount),
            allocated_amount: Set(allocated),
            percentage: Set(rule.percentage),
            priority: Set(rule.priority),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        shares.push(AllocationShare {
            allocation_id: rule.id,
            name: rule.name.clone(),
            priority: rule.priority,
            percentage: rule.percentage,
            allocated_amount: allocated,
            current_amount,
            target_amount: rule.target_amount,
        });

        let mut active: allocation::ActiveModel = rule.into();
        active.current_amount = Set(current_amount);
        active.updated_at = Set(now);
        active.update(conn).await?;
    }

    let total_distributed: i64 = shares.iter().map(|s| s.allocated_amount).sum();
    let free_cash = amount - total_distributed;
    info!(
        user_id,
        transaction_id,
        total_income = amount,
        total_distributed,
        free_cash,
        "Income distributed"
    );

    Ok(DistributionSummary {
        transaction_id,
        total_income: amount,
        total_distributed,
        free_cash,
        allocations: shares,
    })
}

async fn list_active_allocations<C>(conn: &C, user_id: &str) -> Result<Vec<allocation::Model>>
where
    C: ConnectionTrait,
{
    store::find_for_user::<Allocation>(user_id, Visibility::Alive)
        .filter(allocation::Column::IsActive.eq(true))
        .order_by_asc(allocation::Column::Priority)
        .order_by_asc(allocation::Column::CreatedAt)
        .order_by_asc(allocation::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

fn validate_rule(priority: i32, percentage: f64, target_amount: Option<i64>) -> Result<()> {
    if priority < 1 {
        return Err(Error::invalid("Allocation priority must be at least 1"));
    }
    if !percentage.is_finite() || percentage <= 0.0 || percentage > 100.0 {
        return Err(Error::invalid(format!(
            "Allocation percentage must be in (0, 100], got {percentage}"
        )));
    }
    if let Some(amount) = target_amount
        && amount < 0
    {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Creates an active allocation rule with nothing distributed yet.
///
/// # Errors
/// Returns `Error::InvalidInput` for a blank name, priority below 1, or a percentage
/// outside `(0, 100]`; `Error::InvalidAmount` for a negative target.
pub async fn create_allocation<C>(
    db: &C,
    user_id: &str,
    new: NewAllocation,
    now: DateTime<Utc>,
) -> Result<allocation::Model>
where
    C: ConnectionTrait,
{
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::invalid("Allocation name cannot be empty"));
    }
    validate_rule(new.priority, new.percentage, new.target_amount)?;

    let created = allocation::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name.to_string()),
        priority: Set(new.priority),
        percentage: Set(new.percentage),
        current_amount: Set(0),
        target_amount: Set(new.target_amount),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id, allocation_id = created.id, "Allocation created");
    Ok(created)
}

/// Loads an alive allocation owned by `user_id`.
///
/// # Errors
/// Returns `Error::NotFound` if absent, deleted, or foreign.
pub async fn get_allocation<C>(
    db: &C,
    user_id: &str,
    allocation_id: i64,
) -> Result<allocation::Model>
where
    C: ConnectionTrait,
{
    store::get_owned::<Allocation, _>(db, "allocation", user_id, allocation_id).await
}

/// Lists the user's alive allocations in distribution order.
pub async fn list_allocations<C>(db: &C, user_id: &str) -> Result<Vec<allocation::Model>>
where
    C: ConnectionTrait,
{
    store::find_for_user::<Allocation>(user_id, Visibility::Alive)
        .order_by_asc(allocation::Column::Priority)
        .order_by_asc(allocation::Column::CreatedAt)
        .order_by_asc(allocation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a partial update to an allocation rule.
///
/// # Errors
/// Returns a validation error for out-of-range values, including a target below the
/// amount already distributed.
pub async fn update_allocation<C>(
    db: &C,
    user_id: &str,
    allocation_id: i64,
    update: AllocationUpdate,
    now: DateTime<Utc>,
) -> Result<allocation::Model>
where
    C: ConnectionTrait,
{
    let existing = get_allocation(db, user_id, allocation_id).await?;
    let name = match update.name {
        Some(name) if name.trim().is_empty() => {
            return Err(Error::invalid("Allocation name cannot be empty"));
        }
        Some(name) => name.trim().to_string(),
        None => existing.name.clone(),
    };
    let priority = update.priority.unwrap_or(existing.priority);
    let percentage = update.percentage.unwrap_or(existing.percentage);
    let target_amount = update.target_amount.unwrap_or(existing.target_amount);
    validate_rule(priority, percentage, target_amount)?;

    if let Some(target) = target_amount
        && target < existing.current_amount
    {
        return Err(Error::invalid(format!(
            "Target {target} is below the {} already allocated",
            existing.current_amount
        )));
    }

    let mut active: allocation::ActiveModel = existing.into();
    active.name = Set(name);
    active.priority = Set(priority);
    active.percentage = Set(percentage);
    active.target_amount = Set(target_amount);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Activates or deactivates an allocation rule.
///
/// # Errors
/// Returns `Error::NotFound` if the allocation is not the user's.
pub async fn set_allocation_active<C>(
    db: &C,
    user_id: &str,
    allocation_id: i64,
    is_active: bool,
    now: DateTime<Utc>,
) -> Result<allocation::Model>
where
    C: ConnectionTrait,
{
    let existing = get_allocation(db, user_id, allocation_id).await?;
    let mut active: allocation::ActiveModel = existing.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(now);
    active.update(db).await.map_err(Into::into)
}

/// Soft-deletes an allocation rule; its logs are kept.
///
/// # Errors
/// Returns `Error::NotFound` if the allocation is not the user's.
pub async fn delete_allocation<C>(
    db: &C,
    user_id: &str,
    allocation_id: i64,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = get_allocation(db, user_id, allocation_id).await?;
    let mut active: allocation::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(())
}

/// Lists distribution logs for the user, newest first, optionally for one allocation.
pub async fn list_allocation_logs<C>(
    db: &C,
    user_id: &str,
    allocation_id: Option<i64>,
) -> Result<Vec<allocation_log::Model>>
where
    C: ConnectionTrait,
{
    let mut query = AllocationLog::find().filter(allocation_log::Column::UserId.eq(user_id));
    if let Some(id) = allocation_id {
        query = query.filter(allocation_log::Column::AllocationId.eq(id));
    }
    query
        .order_by_desc(allocation_log::Column::CreatedAt)
        .order_by_desc(allocation_log::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase, TransactionTrait};

    #[test]
    fn test_ideal_share_rounds_down() {
        assert_eq!(ideal_share(1000, 50.0), 500);
        assert_eq!(ideal_share(1000, 33.3), 333);
        assert_eq!(ideal_share(999, 10.0), 99);
        assert_eq!(ideal_share(1, 100.0), 1);
        assert_eq!(ideal_share(1, 50.0), 0);
    }

    #[tokio::test]
    async fn test_create_allocation_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let base = NewAllocation {
            name: "Invest".to_string(),
            priority: 1,
            percentage: 30.0,
            target_amount: None,
        };

        let cases = [
            NewAllocation { name: " ".to_string(), ..base.clone() },
            NewAllocation { priority: 0, ..base.clone() },
            NewAllocation { percentage: 0.0, ..base.clone() },
            NewAllocation { percentage: 100.5, ..base.clone() },
            NewAllocation { percentage: f64::NAN, ..base.clone() },
            NewAllocation { target_amount: Some(-1), ..base.clone() },
        ];
        for case in cases {
            let err = create_allocation(&db, "alice", case, fixture_time()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_distribution_with_cap() -> Result<()> {
        let db = setup_test_db().await?;
        let a1 = create_test_allocation(&db, "alice", "Invest", 1, 50.0, None).await?;
        let a2 = create_test_allocation(&db, "alice", "Emergency", 2, 50.0, Some(200)).await?;

        // Bring A2 to 150 of its 200 target with an earlier income
        let mut seeded: allocation::ActiveModel = a2.clone().into();
        seeded.current_amount = Set(150);
        seeded.update(&db).await?;

        let summary = distribute(&db, "alice", 42, 1000, Utc::now()).await?;
        assert_eq!(summary.total_income, 1000);
        assert_eq!(summary.total_distributed, 550);
        assert_eq!(summary.free_cash, 450);
        assert_eq!(summary.allocations.len(), 2);
        assert_eq!(summary.allocations[0].allocation_id, a1.id);
        assert_eq!(summary.allocations[0].allocated_amount, 500);
        assert_eq!(summary.allocations[1].allocation_id, a2.id);
        assert_eq!(summary.allocations[1].allocated_amount, 50);
        assert_eq!(summary.allocations[1].current_amount, 200);

        assert_eq!(get_allocation(&db, "alice", a1.id).await?.current_amount, 500);
        assert_eq!(get_allocation(&db, "alice", a2.id).await?.current_amount, 200);

        let logs = list_allocation_logs(&db, "alice", None).await?;
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|log| log.transaction_id == 42 && log.income_amount == 1000));

        Ok(())
    }

    #[tokio::test]
    async fn test_no_allocations_means_all_free_cash() -> Result<()> {
        let db = setup_test_db().await?;
        let summary = distribute(&db, "alice", 1, 1000, Utc::now()).await?;
        assert_eq!(summary.free_cash, 1000);
        assert_eq!(summary.total_distributed, 0);
        assert!(summary.allocations.is_empty());
        assert!(list_allocation_logs(&db, "alice", None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_overshoot_is_capped_by_remaining() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_allocation(&db, "alice", "A", 1, 70.0, None).await?;
        create_test_allocation(&db, "alice", "B", 2, 70.0, None).await?;
        let c = create_test_allocation(&db, "alice", "C", 3, 10.0, None).await?;

        let summary = distribute(&db, "alice", 1, 1000, Utc::now()).await?;
        assert_eq!(summary.allocations[0].allocated_amount, 700);
        assert_eq!(summary.allocations[1].allocated_amount, 300);
        assert_eq!(summary.free_cash, 0);
        // Distribution stopped before C
        assert_eq!(summary.allocations.len(), 2);
        assert_eq!(get_allocation(&db, "alice", c.id).await?.current_amount, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_skips_inactive_full_and_foreign_allocations() -> Result<()> {
        let db = setup_test_db().await?;
        let full = create_test_allocation(&db, "alice", "Full", 1, 50.0, Some(0)).await?;
        let inactive = create_test_allocation(&db, "alice", "Paused", 1, 50.0, None).await?;
        set_allocation_active(&db, "alice", inactive.id, false, fixture_time()).await?;
        create_test_allocation(&db, "bob", "Bob's", 1, 50.0, None).await?;
        let live = create_test_allocation(&db, "alice", "Live", 5, 20.0, None).await?;

        let summary = distribute(&db, "alice", 7, 500, Utc::now()).await?;
        assert_eq!(summary.allocations.len(), 1);
        assert_eq!(summary.allocations[0].allocation_id, live.id);
        assert_eq!(summary.allocations[0].allocated_amount, 100);
        assert_eq!(summary.free_cash, 400);
        assert_eq!(get_allocation(&db, "alice", full.id).await?.current_amount, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_priority_ties_follow_creation_order() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_allocation(&db, "alice", "First", 1, 60.0, None).await?;
        let second = create_test_allocation(&db, "alice", "Second", 1, 60.0, None).await?;

        let summary = distribute(&db, "alice", 1, 100, Utc::now()).await?;
        assert_eq!(summary.allocations[0].allocation_id, first.id);
        assert_eq!(summary.allocations[0].allocated_amount, 60);
        assert_eq!(summary.allocations[1].allocation_id, second.id);
        assert_eq!(summary.allocations[1].allocated_amount, 40);

        Ok(())
    }

    #[tokio::test]
    async fn test_conservation_and_caps_over_many_incomes() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_allocation(&db, "alice", "Rent", 1, 35.0, Some(1_500)).await?;
        create_test_allocation(&db, "alice", "Invest", 2, 33.3, None).await?;
        create_test_allocation(&db, "alice", "Fun", 3, 12.5, Some(250)).await?;
        create_test_allocation(&db, "alice", "Greedy", 4, 90.0, Some(4_000)).await?;

        for (tx_id, amount) in [(1, 1_000), (2, 3), (3, 7_777), (4, 1), (5, 250_000), (6, 999)] {
            let summary = distribute(&db, "alice", tx_id, amount, Utc::now()).await?;
            assert_eq!(summary.total_distributed + summary.free_cash, summary.total_income);
            assert!(summary.free_cash >= 0);
            for share in &summary.allocations {
                assert!(share.allocated_amount > 0);
                if let Some(target) = share.target_amount {
                    assert!(share.current_amount <= target);
                }
            }
        }

        for rule in list_allocations(&db, "alice").await? {
            assert!(rule.current_amount >= 0);
            if let Some(target) = rule.target_amount {
                assert!(rule.current_amount <= target);
            }
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_rollback_discards_distribution() -> Result<()> {
        let db = setup_test_db().await?;
        let rule = create_test_allocation(&db, "alice", "Invest", 1, 50.0, None).await?;

        let txn = db.begin().await?;
        distribute(&txn, "alice", 1, 1000, Utc::now()).await?;
        txn.rollback().await?;

        assert_eq!(get_allocation(&db, "alice", rule.id).await?.current_amount, 0);
        assert!(list_allocation_logs(&db, "alice", Some(rule.id)).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_allocation_rejects_target_below_current() -> Result<()> {
        let db = setup_test_db().await?;
        let rule = create_test_allocation(&db, "alice", "Invest", 1, 50.0, None).await?;
        distribute(&db, "alice", 1, 1000, Utc::now()).await?;

        let err = update_allocation(
            &db,
            "alice",
            rule.id,
            AllocationUpdate {
                target_amount: Some(Some(100)),
                ..Default::default()
            },
            fixture_time(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let updated = update_allocation(
            &db,
            "alice",
            rule.id,
            AllocationUpdate {
                name: Some("Index funds".to_string()),
                percentage: Some(25.0),
                target_amount: Some(Some(900)),
                ..Default::default()
            },
            fixture_time(),
        )
        .await?;
        assert_eq!(updated.name, "Index funds");
        assert_eq!(updated.percentage, 25.0);
        assert_eq!(updated.target_amount, Some(900));
        assert_eq!(updated.current_amount, 500);

        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_allocation_keeps_logs() -> Result<()> {
        let db = setup_test_db().await?;
        let rule = create_test_allocation(&db, "alice", "Invest", 1, 10.0, None).await?;
        distribute(&db, "alice", 1, 1000, Utc::now()).await?;
        delete_allocation(&db, "alice", rule.id, fixture_time()).await?;

        assert!(list_allocations(&db, "alice").await?.is_empty());
        assert_eq!(list_allocation_logs(&db, "alice", Some(rule.id)).await?.len(), 1);

        let summary = distribute(&db, "alice", 2, 1000, Utc::now()).await?;
        assert_eq!(summary.free_cash, 1000);

        Ok(())
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn percentage() -> impl Strategy<Value = f64> {
            prop_oneof![0.01f64..=100.0, Just(100.0), Just(33.3), Just(50.0)]
        }

        fn share_rule() -> impl Strategy<Value = ShareRule> {
            (percentage(), 0i64..50_000, proptest::option::of(0i64..80_000)).prop_map(
                |(percentage, current_amount, target_amount)| ShareRule {
                    percentage,
                    current_amount,
                    target_amount,
                },
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(512))]

            #[test]
            fn prop_shares_never_exceed_income_or_targets(
                amount in 1i64..10_000_000,
                rules in prop::collection::vec(share_rule(), 0..8),
            ) {
                let shares = plan_shares(amount, &rules);
                prop_assert_eq!(shares.len(), rules.len());

                let distributed: i64 = shares.iter().sum();
                prop_assert!(distributed <= amount);

                for (rule, share) in rules.iter().zip(&shares) {
                    prop_assert!(*share >= 0);
                    prop_assert!(*share <= ideal_share(amount, rule.percentage));
                    if let Some(target) = rule.target_amount {
                        if rule.current_amount >= target {
                            prop_assert_eq!(*share, 0);
                        } else {
                            prop_assert!(rule.current_amount + share <= target);
                        }
                    }
                }
            }

            #[test]
            fn prop_uncapped_rules_take_ideal_share_while_income_lasts(
                amount in 1i64..10_000_000,
                percentages in prop::collection::vec(percentage(), 1..6),
            ) {
                let rules: Vec<_> = percentages
                    .iter()
                    .map(|&percentage| ShareRule {
                        percentage,
                        current_amount: 0,
                        target_amount: None,
                    })
                    .collect();
                let shares = plan_shares(amount, &rules);

                let mut remaining = amount;
                for (rule, share) in rules.iter().zip(&shares) {
                    prop_assert_eq!(*share, ideal_share(amount, rule.percentage).min(remaining));
                    remaining -= share;
                }
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn prop_distribution_accounts_for_whole_income(
                amount in 1i64..1_000_000,
                rules in prop::collection::vec(
                    (percentage(), proptest::option::of(0i64..200_000)),
                    0..6,
                ),
                incomes in 1usize..4,
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let (summaries, stored) = runtime.block_on(async {
                    let db = setup_test_db().await.unwrap();
                    for (index, (percentage, target)) in rules.iter().enumerate() {
                        let priority = i32::try_from(index).unwrap() + 1;
                        create_test_allocation(
                            &db,
                            "alice",
                            &format!("Rule {priority}"),
                            priority,
                            *percentage,
                            *target,
                        )
                        .await
                        .unwrap();
                    }

                    let mut summaries = Vec::new();
                    for transaction_id in 1..=i64::try_from(incomes).unwrap() {
                        let txn = db.begin().await.unwrap();
                        let summary =
                            distribute(&txn, "alice", transaction_id, amount, fixture_time())
                                .await
                                .unwrap();
                        txn.commit().await.unwrap();
                        summaries.push(summary);
                    }
                    let stored = list_allocations(&db, "alice").await.unwrap();
                    (summaries, stored)
                });

                for summary in &summaries {
                    prop_assert_eq!(
                        summary.total_distributed + summary.free_cash,
                        summary.total_income
                    );
                    prop_assert!(summary.free_cash >= 0);
                    let shares: i64 =
                        summary.allocations.iter().map(|a| a.allocated_amount).sum();
                    prop_assert_eq!(shares, summary.total_distributed);
                }
                for rule in &stored {
                    prop_assert!(rule.current_amount >= 0);
                    if let Some(target) = rule.target_amount {
                        prop_assert!(rule.current_amount <= target);
                    }
                }
            }
        }
    }
}
