//! Provider-neutral event types.
//!
//! Providers convert whatever their store holds into these types. Times are
//! normalized to UTC at that boundary, so the sync logic only ever compares
//! `DateTime<Utc>` values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{BUSY_LOCATION, BUSY_SUBJECT};
use crate::error::{SyncError, SyncResult};

/// A source calendar occurrence.
///
/// Recurring events arrive already expanded: each instance has its own `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub status: BusyStatus,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Event {
            id: id.into(),
            subject: subject.into(),
            start,
            end,
            status: BusyStatus::Busy,
        }
    }

    pub fn with_status(mut self, status: BusyStatus) -> Self {
        self.status = status;
        self
    }

    /// Check the `start <= end` invariant and return the interval.
    pub fn interval(&self) -> SyncResult<(DateTime<Utc>, DateTime<Utc>)> {
        if self.start > self.end {
            return Err(SyncError::InvalidInterval {
                start: self.start,
                end: self.end,
            });
        }
        Ok((self.start, self.end))
    }

    /// "2024-06-10 14:00 → 15:00", or with both dates when the event spans midnight.
    pub fn render_interval(&self) -> String {
        render_interval(self.start, self.end)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.subject)
    }
}

pub fn render_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.date_naive() == end.date_naive() {
        format!("{} → {}", start.format("%Y-%m-%d %H:%M"), end.format("%H:%M"))
    } else {
        format!(
            "{} → {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        )
    }
}

/// A time as a provider stores it, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    /// All-day
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    /// No timezone attached; interpreted in the configured floating zone
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl EventTime {
    /// Normalize to UTC. Floating times and all-day dates are read in `floating`.
    ///
    /// Ambiguous local times (DST fold) resolve to the earlier instant; local
    /// times skipped by a DST gap are an error.
    pub fn to_utc(&self, floating: Tz) -> SyncResult<DateTime<Utc>> {
        match self {
            EventTime::DateTimeUtc(dt) => Ok(*dt),
            EventTime::DateTimeFloating(naive) => local_to_utc(floating, naive),
            EventTime::Date(d) => local_to_utc(floating, &d.and_time(NaiveTime::MIN)),
            EventTime::DateTimeZoned { datetime, tzid } => {
                let tz: Tz = tzid
                    .parse()
                    .map_err(|_| SyncError::Time(format!("Unknown timezone '{}'", tzid)))?;
                local_to_utc(tz, datetime)
            }
        }
    }
}

fn local_to_utc(tz: Tz, naive: &NaiveDateTime) -> SyncResult<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            SyncError::Time(format!("{} does not exist in {}", naive, tz.name()))
        })
}

/// Whether an entry blocks time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyStatus {
    /// Opaque: shows as busy
    #[default]
    Busy,
    /// Transparent: shows as free
    Free,
}

/// The fields of a busy block before the provider persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBusyBlock {
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BusyStatus,
    pub location: String,
    pub body: String,
}

impl NewBusyBlock {
    /// Build the block mirroring `event`. The interval is copied verbatim.
    pub fn for_event(event: &Event) -> Self {
        NewBusyBlock {
            subject: BUSY_SUBJECT.to_string(),
            start: event.start,
            end: event.end,
            status: BusyStatus::Busy,
            location: BUSY_LOCATION.to_string(),
            body: format!("Blocked due to event: {}", event.subject),
        }
    }
}

/// A busy block persisted on a target calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusyBlock {
    pub id: String,
    #[serde(flatten)]
    pub block: NewBusyBlock,
}

impl BusyBlock {
    pub fn start(&self) -> DateTime<Utc> {
        self.block.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.block.end
    }
}
