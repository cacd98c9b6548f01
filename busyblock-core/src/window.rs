//! The date range bounding which source events are mirrored.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::provider::IntervalFilter;

/// Half-open `[start, end)` window.
///
/// Membership is stricter than intersection: an event must start at or after
/// `start` and end at or before `end`. Events straddling either boundary are
/// left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult<Self> {
        if start >= end {
            return Err(SyncError::Config(format!(
                "Sync window start {} must be before its end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(SyncWindow { start, end })
    }

    /// Midnight of `from` through midnight of `to`, both read in `tz`.
    pub fn from_dates(from: NaiveDate, to: NaiveDate, tz: Tz) -> SyncResult<Self> {
        Self::new(local_midnight(from, tz)?, local_midnight(to, tz)?)
    }

    /// Build a window from optional YYYY-MM-DD arguments.
    /// - `from` defaults to today
    /// - `to` defaults to `from + days`
    pub fn from_args(from: Option<&str>, to: Option<&str>, days: i64, tz: Tz) -> SyncResult<Self> {
        let from_date = match from {
            Some(s) => parse_date(s)?,
            None => Utc::now().with_timezone(&tz).date_naive(),
        };

        let to_date = match to {
            Some(s) => parse_date(s)?,
            None => Duration::try_days(days)
                .and_then(|span| from_date.checked_add_signed(span))
                .ok_or_else(|| {
                    SyncError::Config(format!("Window of {} days is out of range", days))
                })?,
        };

        Self::from_dates(from_date, to_date, tz)
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.filter().matches(event.start, event.end)
    }

    /// The provider query selecting exactly the events inside this window.
    pub fn filter(&self) -> IntervalFilter {
        IntervalFilter::Within {
            from: self.start,
            to: self.end,
        }
    }
}

fn parse_date(s: &str) -> SyncResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        SyncError::Config(format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
    })
}

fn local_midnight(date: NaiveDate, tz: Tz) -> SyncResult<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| SyncError::Time(format!("Midnight of {} does not exist in {}", date, tz)))
}
