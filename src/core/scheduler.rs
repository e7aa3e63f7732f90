//! Daily summary job scheduling.
//!
//! Schedules use the five-field cron syntax restricted to a fixed minute and hour
//! with wildcard day, month and weekday, evaluated in the users' zone.

use crate::{
    config::settings::AppConfig,
    core::{
        Ledger,
        store,
        summary::{self, SummaryRunReport},
        time,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Days, Utc};
use jiff::tz::TimeZone;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, instrument};

/// A daily fire time parsed from `"M H * * *"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSchedule {
    minute: u32,
    hour: u32,
}

impl CronSchedule {
    /// Parses a cron expression of the form `"M H * * *"`.
    ///
    /// # Errors
    /// Returns `Error::Config` for any other shape or out-of-range values.
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Config {
            message: format!("Unsupported cron expression '{expression}': {reason}"),
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(invalid("expected five fields"));
        };
        if [day, month, weekday].iter().any(|f| **f != "*") {
            return Err(invalid("day, month and weekday must be '*'"));
        }

        let minute: u32 = minute.parse().map_err(|_| invalid("minute is not a number"))?;
        let hour: u32 = hour.parse().map_err(|_| invalid("hour is not a number"))?;
        if minute > 59 || hour > 23 {
            return Err(invalid("minute or hour out of range"));
        }
        Ok(Self { minute, hour })
    }

    /// First fire time strictly after `now`, reading the schedule as wall-clock time
    /// in `zone`.
    ///
    /// # Errors
    /// Returns `Error::Internal` if the local day cannot be represented.
    pub fn next_after(&self, now: DateTime<Utc>, zone: &TimeZone) -> Result<DateTime<Utc>> {
        let today = time::local_date(now, zone)?;
        let fire_on = |date| time::wall_clock(date, self.hour, self.minute, zone);

        let candidate = fire_on(today)?;
        if candidate > now {
            return Ok(candidate);
        }
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::Internal {
                message: format!("No calendar day after {today}"),
            })?;
        fire_on(tomorrow)
    }
}

impl FromStr for CronSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} * * *", self.minute, self.hour)
    }
}

/// Builds yesterday's summaries once a day.
pub struct DailySummaryScheduler {
    ledger: Ledger,
    schedule: CronSchedule,
    job_timeout: Duration,
}

impl DailySummaryScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub const fn new(ledger: Ledger, schedule: CronSchedule, job_timeout: Duration) -> Self {
        Self {
            ledger,
            schedule,
            job_timeout,
        }
    }

    /// Creates a scheduler from the configured cron expression and job timeout.
    ///
    /// # Errors
    /// Returns `Error::Config` if the cron expression is not supported.
    pub fn from_config(ledger: Ledger, config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            ledger,
            CronSchedule::parse(&config.daily_summary_cron)?,
            config.summary_job_timeout(),
        ))
    }

    /// Ledger the job runs against
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Sleeps until each fire time and runs the job; never returns.
    pub async fn run(&self) {
        info!(schedule = %self.schedule, "Daily summary scheduler started");
        loop {
            let now = self.ledger.now();
            let next = match self.schedule.next_after(now, &self.ledger.zone) {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, "Cannot compute next daily summary run; stopping");
                    return;
                }
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "Waiting for next daily summary run");
            tokio::time::sleep(wait).await;

            if let Err(e) = self.tick().await {
                error!(error = %e, "Daily summary run failed");
            }
        }
    }

    /// Builds yesterday's summaries now, bounded by the job timeout.
    ///
    /// # Errors
    /// Returns `Error::Timeout` if the job outlives its deadline, or the error from
    /// reading the active users.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<SummaryRunReport> {
        store::with_deadline(
            "daily_summary_job",
            self.job_timeout,
            summary::build_yesterday(&self.ledger),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::transaction::{MutationScope, create_transaction};
    use crate::entities::PocketType;
    use crate::test_utils::*;
    use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone as _};

    #[test]
    fn test_parse_supported_shape() {
        let schedule = CronSchedule::parse("1 0 * * *").unwrap();
        assert_eq!(schedule, CronSchedule { minute: 1, hour: 0 });
        assert_eq!(schedule.to_string(), "1 0 * * *");
        assert_eq!("30 23 * * *".parse::<CronSchedule>().unwrap().hour, 23);
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        for expression in ["", "1 0 * *", "*/5 * * * *", "1 0 1 * *", "60 0 * * *", "0 24 * * *"] {
            let err = CronSchedule::parse(expression).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{expression}");
        }
    }

    #[test]
    fn test_next_after_uses_local_zone() {
        let schedule = CronSchedule::parse("1 0 * * *").unwrap();
        let zone = test_zone();

        // 2024-06-15 12:00 local; next run is 2024-06-16 00:01 local
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 5, 0, 0).unwrap();
        let next = schedule.next_after(now, &zone).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 15, 17, 1, 0).unwrap());

        // 2024-06-15 00:00:30 local; today's fire time is still ahead
        let early = Utc.with_ymd_and_hms(2024, 6, 14, 17, 0, 30).unwrap();
        assert_eq!(
            schedule.next_after(early, &zone).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 14, 17, 1, 0).unwrap()
        );

        // Exactly at the fire time moves to the next day
        assert_eq!(
            schedule.next_after(next, &zone).unwrap(),
            next + ChronoDuration::days(1)
        );
    }

    #[test]
    fn test_next_after_keeps_wall_clock_across_dst() {
        let schedule = CronSchedule::parse("1 0 * * *").unwrap();
        let new_york = TimeZone::get("America/New_York").unwrap();

        // 2024-03-09 12:00 EST; next run is 00:01 EST on 03-10
        let before = Utc.with_ymd_and_hms(2024, 3, 9, 17, 0, 0).unwrap();
        let first = schedule.next_after(before, &new_york).unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 3, 10, 5, 1, 0).unwrap());

        // The day after the switch fires at 00:01 EDT, 23 hours later
        let second = schedule.next_after(first, &new_york).unwrap();
        assert_eq!(second, Utc.with_ymd_and_hms(2024, 3, 11, 4, 1, 0).unwrap());
        assert_eq!(second - first, ChronoDuration::hours(23));
    }

    #[tokio::test]
    async fn test_tick_builds_yesterday() -> Result<()> {
        // 2024-06-15 00:01 local
        let now = Utc.with_ymd_and_hms(2024, 6, 14, 17, 1, 0).unwrap();
        let ledger = setup_ledger(now).await?;
        let main = create_test_pocket(&ledger.database, "alice", "Main", PocketType::Main).await?;
        let mut salary = income(500, Some(main.id), None);
        salary.date = Some(now - ChronoDuration::hours(6));
        create_transaction(&ledger, "alice", salary, MutationScope::User).await?;

        let scheduler = DailySummaryScheduler::new(
            ledger,
            CronSchedule::parse("1 0 * * *")?,
            Duration::from_secs(60),
        );
        let report = scheduler.tick().await?;

        let yesterday = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        assert_eq!(report.date, yesterday);
        assert_eq!(report.users_processed, 1);
        let db = &scheduler.ledger().database;
        let stored = summary::get_daily_summary(db, "alice", yesterday).await?.unwrap();
        assert_eq!(stored.total_income, 500);

        Ok(())
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_cron() -> Result<()> {
        let ledger = setup_ledger(Utc::now()).await?;
        let config = AppConfig {
            daily_summary_cron: "every day".to_string(),
            ..AppConfig::default()
        };
        assert!(DailySummaryScheduler::from_config(ledger, &config).is_err());
        Ok(())
    }
}
