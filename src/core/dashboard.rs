//! Dashboard aggregator - Period totals and charts from summaries plus live data.
//!
//! Days before today come from materialized daily summaries; today onwards is
//! aggregated from raw transactions on every call. Category buckets from both sources
//! merge on `(type, category id)`, which is why summaries cache category names.

use crate::{
    core::{
        Ledger,
        store::{self, Visibility},
        summary, time,
    },
    entities::{CategoryAmount, DailySummary, Pocket, TransactionType, daily_summary, pocket},
    errors::{Error, Result},
};
use chrono::{Days, NaiveDate};
use sea_orm::{QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Period a dashboard query covers, always ending now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DashboardRange {
    /// Rolling seven days
    #[serde(rename = "7d")]
    SevenDays,
    /// Since the first of the current month
    #[serde(rename = "1m")]
    OneMonth,
    /// Since the first of the month three months ago
    #[serde(rename = "3m")]
    ThreeMonths,
    /// Rolling thirty days
    #[default]
    #[serde(rename = "default")]
    Default,
}

impl DashboardRange {
    /// First day of the range given today's date in the users' zone.
    #[must_use]
    pub fn start(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::SevenDays => today.checked_sub_days(Days::new(7)).unwrap_or(today),
            Self::OneMonth => time::first_of_month(today, 0),
            Self::ThreeMonths => time::first_of_month(today, 3),
            Self::Default => today.checked_sub_days(Days::new(30)).unwrap_or(today),
        }
    }
}

impl FromStr for DashboardRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "7d" => Ok(Self::SevenDays),
            "1m" => Ok(Self::OneMonth),
            "3m" => Ok(Self::ThreeMonths),
            "" | "default" => Ok(Self::Default),
            other => Err(Error::invalid(format!("Unknown dashboard range '{other}'"))),
        }
    }
}

impl fmt::Display for DashboardRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenDays => "7d",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::Default => "default",
        })
    }
}

/// Period totals for the dashboard header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Requested range
    pub range: DashboardRange,
    /// First day covered
    pub start: NaiveDate,
    /// Today in the users' zone
    pub today: NaiveDate,
    /// Income over the period
    pub period_income: i64,
    /// Expense over the period
    pub period_expense: i64,
    /// `period_income - period_expense`
    pub period_net: i64,
    /// Sum of alive, active pocket balances right now
    pub total_net_worth: i64,
    /// Per-category totals over the period, largest first
    pub categories: Vec<CategoryAmount>,
}

/// One day of the cash-flow chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowPoint {
    /// Calendar day
    pub date: NaiveDate,
    /// Income on that day
    pub income: i64,
    /// Expense on that day
    pub expense: i64,
    /// `income - expense`
    pub net: i64,
}

/// A category's slice of a pie chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    /// Category id, `None` for uncategorized
    pub category_id: Option<i64>,
    /// Display name
    pub category_name: String,
    /// Amount over the period
    pub amount: i64,
    /// Share of the type's total, in percent
    pub percentage: f64,
}

/// Chart series for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCharts {
    /// Requested range
    pub range: DashboardRange,
    /// One point per day from the range start through today
    pub cash_flow: Vec<CashFlowPoint>,
    /// Income split by category
    pub income_categories: Vec<CategoryShare>,
    /// Expense split by category
    pub expense_categories: Vec<CategoryShare>,
}

/// Historical and live data for one user and range
struct Period {
    start: NaiveDate,
    today: NaiveDate,
    summaries: Vec<daily_summary::Model>,
    live: Vec<CategoryAmount>,
}

impl Period {
    async fn load(ledger: &Ledger, user_id: &str, range: DashboardRange) -> Result<Self> {
        let today = ledger.today()?;
        let start = range.start(today);

        let summaries = DailySummary::find()
            .filter(daily_summary::Column::UserId.eq(user_id))
            .filter(daily_summary::Column::Date.gte(start))
            .filter(daily_summary::Column::Date.lt(today))
            .order_by_asc(daily_summary::Column::Date)
            .all(&ledger.database)
            .await?;

        let today_start = time::day_start(today, &ledger.zone)?;
        let buckets = summary::aggregate(&ledger.database, user_id, today_start, None).await?;
        let live = summary::name_buckets(&ledger.database, buckets).await?;

        debug!(
            user_id,
            %start,
            %today,
            historical_days = summaries.len(),
            live_buckets = live.len(),
            "Dashboard period loaded"
        );
        Ok(Self {
            start,
            today,
            summaries,
            live,
        })
    }

    fn totals(&self, entry_type: TransactionType) -> i64 {
        let historical: i64 = self
            .summaries
            .iter()
            .map(|s| match entry_type {
                TransactionType::Income => s.total_income,
                _ => s.total_expense,
            })
            .sum();
        historical + summary::total_of(&self.live, entry_type)
    }

    /// Historical and live buckets merged on `(type, category id)`. The most recent
    /// cached name wins. Sorted by amount descending, then name.
    fn categories(&self) -> Vec<CategoryAmount> {
        let mut merged: BTreeMap<(bool, Option<i64>), CategoryAmount> = BTreeMap::new();
        let entries = self
            .summaries
            .iter()
            .flat_map(|s| s.category_breakdown.0.iter())
            .chain(self.live.iter());
        for entry in entries {
            let key = (entry.entry_type == TransactionType::Income, entry.category_id);
            merged
                .entry(key)
                .and_modify(|existing| {
                    existing.amount += entry.amount;
                    existing.category_name.clone_from(&entry.category_name);
                })
                .or_insert_with(|| entry.clone());
        }

        let mut categories: Vec<CategoryAmount> = merged.into_values().collect();
        categories.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.category_name.cmp(&b.category_name))
        });
        categories
    }

    fn cash_flow(&self) -> Vec<CashFlowPoint> {
        let by_day: BTreeMap<NaiveDate, &daily_summary::Model> =
            self.summaries.iter().map(|s| (s.date, s)).collect();

        let mut points: Vec<CashFlowPoint> = time::days_between(self.start, self.today)
            .map(|date| {
                let (income, expense) = by_day
                    .get(&date)
                    .map_or((0, 0), |s| (s.total_income, s.total_expense));
                point(date, income, expense)
            })
            .collect();
        points.push(point(
            self.today,
            summary::total_of(&self.live, TransactionType::Income),
            summary::total_of(&self.live, TransactionType::Expense),
        ));
        points
    }
}

const fn point(date: NaiveDate, income: i64, expense: i64) -> CashFlowPoint {
    CashFlowPoint {
        date,
        income,
        expense,
        net: income - expense,
    }
}

#[allow(clippy::cast_precision_loss)]
fn shares(categories: &[CategoryAmount], entry_type: TransactionType) -> Vec<CategoryShare> {
    let total = summary::total_of(categories, entry_type);
    categories
        .iter()
        .filter(|c| c.entry_type == entry_type)
        .map(|c| CategoryShare {
            category_id: c.category_id,
            category_name: c.category_name.clone(),
            amount: c.amount,
            percentage: if total == 0 {
                0.0
            } else {
                c.amount as f64 / total as f64 * 100.0
            },
        })
        .collect()
}

/// Sum of the user's alive, active pocket balances.
pub async fn total_net_worth<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let pockets = store::find_for_user::<Pocket>(user_id, Visibility::Alive)
        .filter(pocket::Column::IsActive.eq(true))
        .all(db)
        .await?;
    Ok(pockets.iter().map(|p| p.balance).sum())
}

/// Period totals for the dashboard header.
///
/// Days before today are read from daily summaries; a day that was never
/// materialized contributes nothing.
///
/// # Errors
/// Returns the store error or `Error::Timeout`.
#[instrument(skip(ledger))]
pub async fn get_summary(
    ledger: &Ledger,
    user_id: &str,
    range: DashboardRange,
) -> Result<DashboardSummary> {
    store::with_deadline("dashboard_summary", ledger.store_timeout, async {
        let period = Period::load(ledger, user_id, range).await?;
        let period_income = period.totals(TransactionType::Income);
        let period_expense = period.totals(TransactionType::Expense);
        Ok(DashboardSummary {
            range,
            start: period.start,
            today: period.today,
            period_income,
            period_expense,
            period_net: period_income - period_expense,
            total_net_worth: total_net_worth(&ledger.database, user_id).await?,
            categories: period.categories(),
        })
    })
    .await
}

/// Cash-flow series and category splits for the dashboard charts.
///
/// # Errors
/// Returns the store error or `Error::Timeout`.
#[instrument(skip(ledger))]
pub async fn get_charts(
    ledger: &Ledger,
    user_id: &str,
    range: DashboardRange,
) -> Result<DashboardCharts> {
    store::with_deadline("dashboard_charts", ledger.store_timeout, async {
        let period = Period::load(ledger, user_id, range).await?;
        let categories = period.categories();
        Ok(DashboardCharts {
            range,
            cash_flow: period.cash_flow(),
            income_categories: shares(&categories, TransactionType::Income),
            expense_categories: shares(&categories, TransactionType::Expense),
        })
    })
    .await
}
