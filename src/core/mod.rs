//! Core business logic - framework-agnostic ledger operations.
//!
//! Balance mutation, income distribution, transaction orchestration, daily summary
//! materialization and dashboard aggregation all live here. The API and bot layers
//! consume these functions and map [`crate::errors::ErrorKind`] to their own responses.

/// Priority-ordered income distribution and allocation rule management
pub mod allocation;
/// The single authority that mutates pocket and user-platform balances
pub mod balance;
/// Category management and name resolution
pub mod category;
/// Hybrid period summaries and charts
pub mod dashboard;
/// Pocket management and invariants
pub mod pocket;
/// Cron-driven daily summary job
pub mod scheduler;
/// Store adapter: alive-by-default queries, ownership, deadlines
pub mod store;
/// Daily summary materialization
pub mod summary;
/// Clock and calendar helpers
pub mod time;
/// Transaction creation, cancellation and queries
pub mod transaction;
/// User platform management
pub mod user_platform;

use crate::config::settings::AppConfig;
use crate::errors::Result;
use chrono::{DateTime, NaiveDate, Utc};
use jiff::tz::TimeZone;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use time::TimeSource;

/// Shared context handed to every ledger service call.
///
/// Holds the store connection, the clock, the users' zone, and the per-operation
/// deadline.
#[derive(Debug)]
pub struct Ledger {
    /// Store connection
    pub database: DatabaseConnection,
    /// Source of "now"
    pub clock: TimeSource,
    /// The users' IANA zone
    pub zone: TimeZone,
    /// Deadline for a single service operation
    pub store_timeout: Duration,
}

impl Ledger {
    /// Builds a ledger context from loaded settings, using the system clock.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configured zone is unknown.
    pub fn new(database: DatabaseConnection, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            database,
            clock: TimeSource::system(),
            zone: config.time_zone()?,
            store_timeout: config.store_timeout(),
        })
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: TimeSource) -> Self {
        self.clock = clock;
        self
    }

    /// Current instant
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current calendar day in the users' zone
    ///
    /// # Errors
    /// Returns `Error::Internal` if "now" is outside the zone database's range.
    pub fn today(&self) -> Result<NaiveDate> {
        time::local_date(self.now(), &self.zone)
    }
}
