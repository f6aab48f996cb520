//! Period selector → concrete `[start, end)` time window.
//!
//! Each period anchors differently, all in the device's local time zone:
//! - `hour`: start of the current clock hour
//! - `day`: local midnight, `count - 1` days back
//! - `week`: `count` weeks back at the current time of day (no midnight alignment)
//! - `month`: `count` calendar months back at the current time of day (no midnight alignment)

use chrono::{DateTime, Days, Duration, Local, Months, NaiveDateTime, TimeZone, Timelike};
use serde::Serialize;

use crate::config;
use crate::error::AppError;

/// Period selector accepted by the usage commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Hour,
    Day,
    Week,
    Month,
}

impl Period {
    pub fn from_id(id: &str) -> Result<Self, AppError> {
        match id {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(AppError::InvalidPeriod(
                "Allowed values: hour, day, week, month".into(),
            )),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Largest accepted `count`. Every period starts at 1.
    pub fn max_count(&self) -> u32 {
        match self {
            Self::Hour => 1,
            Self::Day => config::MAX_DAY_COUNT,
            Self::Week => config::MAX_WEEK_COUNT,
            Self::Month => config::MAX_MONTH_COUNT,
        }
    }

    /// Validate `count` against this period's range.
    pub fn validate_count(&self, count: i64) -> Result<u32, AppError> {
        let max = self.max_count();
        match u32::try_from(count) {
            Ok(c) if (1..=max).contains(&c) => Ok(c),
            _ if max == 1 => Err(AppError::InvalidCount(format!(
                "Count must be 1 for {} period",
                self.id()
            ))),
            _ => Err(AppError::InvalidCount(format!(
                "Count must be between 1 and {max}"
            ))),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Half-open interval in milliseconds since the Unix epoch. `start < end` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    /// Returns `None` unless `start_ms < end_ms`.
    pub fn new(start_ms: i64, end_ms: i64) -> Option<Self> {
        (start_ms < end_ms).then_some(Self { start_ms, end_ms })
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Resolve a selector against the current local time.
pub fn resolve(period: Period, count: i64) -> Result<TimeWindow, AppError> {
    resolve_at(period, count, &Local::now())
}

/// Resolve a selector against an explicit `now`, in `now`'s time zone.
pub fn resolve_at<Tz: TimeZone>(
    period: Period,
    count: i64,
    now: &DateTime<Tz>,
) -> Result<TimeWindow, AppError> {
    let count = period.validate_count(count)?;
    let local = now.naive_local();

    let start = match period {
        Period::Hour => {
            let into_hour = Duration::minutes(i64::from(now.minute()))
                + Duration::seconds(i64::from(now.second()))
                + Duration::nanoseconds(i64::from(now.nanosecond()));
            now.clone() - into_hour
        }
        Period::Day => {
            let day = local
                .date()
                .checked_sub_days(Days::new(u64::from(count - 1)))
                .unwrap_or(local.date());
            to_instant(now, day.and_hms_opt(0, 0, 0).unwrap_or(local))
        }
        Period::Week => {
            let target = local
                .checked_sub_days(Days::new(7 * u64::from(count)))
                .unwrap_or(local);
            to_instant(now, target)
        }
        Period::Month => {
            let target = local.checked_sub_months(Months::new(count)).unwrap_or(local);
            to_instant(now, target)
        }
    };

    let end_ms = now.timestamp_millis();
    let mut start_ms = start.timestamp_millis();
    if start_ms >= end_ms {
        // Resolved exactly on an hour or midnight boundary.
        start_ms = end_ms - 1;
    }

    tracing::trace!("Resolved {period} x{count} to [{start_ms}, {end_ms})");
    Ok(TimeWindow { start_ms, end_ms })
}

/// Map a local wall-clock time back to an instant in `now`'s zone.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Non-existent
/// times (DST spring-forward gap) take the first valid instant an hour later,
/// falling back to plain offset arithmetic from `now`.
fn to_instant<Tz: TimeZone>(now: &DateTime<Tz>, target: NaiveDateTime) -> DateTime<Tz> {
    let tz = now.timezone();
    tz.from_local_datetime(&target)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(target + Duration::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| now.clone() - (now.naive_local() - target))
}
