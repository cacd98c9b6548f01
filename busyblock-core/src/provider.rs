//! The capability interface every calendar backend implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncResult;
use crate::event::{BusyBlock, Event, NewBusyBlock};

/// An account/calendar pair as named by the user, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRef {
    pub account: String,
    pub calendar: String,
}

impl CalendarRef {
    pub fn new(account: impl Into<String>, calendar: impl Into<String>) -> Self {
        CalendarRef {
            account: account.into(),
            calendar: calendar.into(),
        }
    }
}

impl fmt::Display for CalendarRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.calendar)
    }
}

/// A calendar the provider has located. `id` is opaque and provider-specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarHandle {
    pub id: String,
    pub account: String,
    pub calendar: String,
}

impl fmt::Display for CalendarHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.calendar)
    }
}

/// Which entries a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalFilter {
    /// `start >= from AND end <= to`
    Within {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// `start < to AND end > from`
    Intersecting {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// `start <= to AND end >= from`. Finds entries around a zero-length interval.
    Touching {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl IntervalFilter {
    pub fn matches(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match *self {
            IntervalFilter::Within { from, to } => start >= from && end <= to,
            IntervalFilter::Intersecting { from, to } => start < to && end > from,
            IntervalFilter::Touching { from, to } => start <= to && end >= from,
        }
    }

    /// The widest instant range an entry can touch and still match.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            IntervalFilter::Within { from, to }
            | IntervalFilter::Intersecting { from, to }
            | IntervalFilter::Touching { from, to } => (from, to),
        }
    }
}

/// A calendar store the sync engine reads from and writes to.
///
/// Implementations return events already normalized to UTC and sorted by start.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Short name used in diagnostics ("ics", "memory", "outlook", ...).
    fn name(&self) -> &str;

    /// Locate a calendar, failing with `SyncError::CalendarNotFound` when the
    /// account or calendar does not exist.
    async fn resolve_calendar(&self, account: &str, calendar: &str)
    -> SyncResult<CalendarHandle>;

    async fn query_events(
        &self,
        calendar: &CalendarHandle,
        filter: &IntervalFilter,
        expand_recurrences: bool,
    ) -> SyncResult<Vec<Event>>;

    /// Persist one new entry. No other entry may be modified.
    async fn create_entry(
        &self,
        calendar: &CalendarHandle,
        block: &NewBusyBlock,
    ) -> SyncResult<BusyBlock>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_intersecting_is_strict_on_both_edges() {
        let filter = IntervalFilter::Intersecting {
            from: at(14, 0),
            to: at(15, 0),
        };

        assert!(filter.matches(at(13, 0), at(14, 1)));
        assert!(filter.matches(at(14, 59), at(16, 0)));
        assert!(!filter.matches(at(13, 0), at(14, 0)));
        assert!(!filter.matches(at(15, 0), at(16, 0)));
    }

    #[test]
    fn test_touching_finds_entries_at_an_instant() {
        let filter = IntervalFilter::Touching {
            from: at(9, 0),
            to: at(9, 0),
        };

        assert!(filter.matches(at(9, 0), at(9, 0)));
        assert!(filter.matches(at(8, 0), at(9, 0)));
        assert!(filter.matches(at(9, 0), at(10, 0)));
        assert!(!filter.matches(at(8, 0), at(8, 59)));
        assert!(!filter.matches(at(9, 1), at(10, 0)));
    }

    #[test]
    fn test_within_is_inclusive_on_both_edges() {
        let filter = IntervalFilter::Within {
            from: at(14, 0),
            to: at(15, 0),
        };

        assert!(filter.matches(at(14, 0), at(15, 0)));
        assert!(!filter.matches(at(13, 59), at(15, 0)));
        assert!(!filter.matches(at(14, 0), at(15, 1)));
    }

    #[test]
    fn test_filter_serializes_with_kind_tag() {
        let filter = IntervalFilter::Within {
            from: at(14, 0),
            to: at(15, 0),
        };
        let json = serde_json::to_value(filter).unwrap();

        assert_eq!(json["kind"], "within");
        assert_eq!(json["from"], "2024-06-10T14:00:00Z");
    }
}
