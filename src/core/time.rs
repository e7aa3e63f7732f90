//! Clock and calendar helpers.
//!
//! Summaries and dashboards group by the calendar day in the users' IANA zone, so a
//! day can be 23 or 25 hours long across a DST change. `TimeSource` lets tests pin
//! "now".

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use jiff::{Timestamp, civil, tz::TimeZone};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current instant.
#[derive(Clone, Debug, Default)]
pub struct TimeSource {
    pinned_millis: Option<Arc<AtomicI64>>,
}

impl TimeSource {
    /// Reads the system clock.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// Always returns `at` until moved with [`TimeSource::set`] or [`TimeSource::advance`].
    #[must_use]
    pub fn pinned(at: DateTime<Utc>) -> Self {
        Self {
            pinned_millis: Some(Arc::new(AtomicI64::new(at.timestamp_millis()))),
        }
    }

    /// Current instant
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.pinned_millis
            .as_ref()
            .and_then(|millis| DateTime::from_timestamp_millis(millis.load(Ordering::SeqCst)))
            .unwrap_or_else(Utc::now)
    }

    /// Moves a pinned clock to `at`; no effect on the system clock.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Some(millis) = &self.pinned_millis {
            millis.store(at.timestamp_millis(), Ordering::SeqCst);
        }
    }

    /// Moves a pinned clock forward; no effect on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Some(millis) = &self.pinned_millis {
            millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }
}

/// Calendar day containing `at` in `zone`.
///
/// # Errors
/// Returns `Error::Internal` if `at` is outside the range the zone database covers.
pub fn local_date(at: DateTime<Utc>, zone: &TimeZone) -> Result<NaiveDate> {
    let timestamp = Timestamp::from_millisecond(at.timestamp_millis()).map_err(zone_error)?;
    from_civil(timestamp.to_zoned(zone.clone()).date())
}

/// UTC instant of the first moment of `date` in `zone`.
///
/// # Errors
/// Returns `Error::Internal` if the local day cannot be represented.
pub fn day_start(date: NaiveDate, zone: &TimeZone) -> Result<DateTime<Utc>> {
    let zoned = to_civil(date)?
        .to_zoned(zone.clone())
        .and_then(|midnight| midnight.start_of_day())
        .map_err(zone_error)?;
    to_utc(zoned.timestamp())
}

/// Half-open UTC window covering `date` in `zone`, from its first moment to the
/// first moment of the next day.
///
/// # Errors
/// Returns `Error::Internal` if either bound cannot be represented.
pub fn day_window(date: NaiveDate, zone: &TimeZone) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date.succ_opt().ok_or_else(|| Error::Internal {
        message: format!("No calendar day after {date}"),
    })?;
    Ok((day_start(date, zone)?, day_start(next, zone)?))
}

/// UTC instant of the wall-clock time `hour:minute` on `date` in `zone`.
///
/// A time skipped by a DST gap resolves to the instant just after the gap.
///
/// # Errors
/// Returns `Error::Internal` if the time is out of range or cannot be represented.
pub fn wall_clock(
    date: NaiveDate,
    hour: u32,
    minute: u32,
    zone: &TimeZone,
) -> Result<DateTime<Utc>> {
    let hour = i8::try_from(hour).map_err(|_| out_of_range("hour", hour))?;
    let minute = i8::try_from(minute).map_err(|_| out_of_range("minute", minute))?;
    let zoned = to_civil(date)?
        .at(hour, minute, 0, 0)
        .to_zoned(zone.clone())
        .map_err(zone_error)?;
    to_utc(zoned.timestamp())
}

fn to_civil(date: NaiveDate) -> Result<civil::Date> {
    let year = i16::try_from(date.year()).map_err(|_| out_of_range("year", date.year()))?;
    let month = i8::try_from(date.month()).map_err(|_| out_of_range("month", date.month()))?;
    let day = i8::try_from(date.day()).map_err(|_| out_of_range("day", date.day()))?;
    civil::Date::new(year, month, day).map_err(zone_error)
}

fn from_civil(date: civil::Date) -> Result<NaiveDate> {
    let month = u32::try_from(date.month()).map_err(|_| out_of_range("month", date.month()))?;
    let day = u32::try_from(date.day()).map_err(|_| out_of_range("day", date.day()))?;
    NaiveDate::from_ymd_opt(i32::from(date.year()), month, day).ok_or_else(|| Error::Internal {
        message: format!("Cannot represent {date} as a calendar date"),
    })
}

fn to_utc(timestamp: Timestamp) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(timestamp.as_millisecond()).ok_or_else(|| Error::Internal {
        message: format!("Cannot represent {timestamp} as a UTC instant"),
    })
}

fn out_of_range(field: &str, value: impl std::fmt::Display) -> Error {
    Error::Internal {
        message: format!("{field} {value} is out of range"),
    }
}

fn zone_error(e: jiff::Error) -> Error {
    Error::Internal {
        message: format!("Zone arithmetic failed: {e}"),
    }
}

/// First day of the month `months_back` calendar months before `date`'s month.
#[must_use]
pub fn first_of_month(date: NaiveDate, months_back: u32) -> NaiveDate {
    let month_index = date.year() * 12 + date.month0() as i32 - months_back as i32;
    let year = month_index.div_euclid(12);
    let month0 = month_index.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(date)
}

/// Iterates the days in `[start, end)`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day < end)
}
