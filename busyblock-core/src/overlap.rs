//! Deciding whether a target calendar already covers an interval.
//!
//! There is no stored link between a busy block and the event that produced
//! it. Every run re-derives that relationship by comparing intervals, so a
//! block created on a previous run makes its source event overlap here.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use crate::provider::{CalendarHandle, CalendarProvider, IntervalFilter};

pub struct OverlapDetector<'a> {
    provider: &'a dyn CalendarProvider,
}

impl<'a> OverlapDetector<'a> {
    pub fn new(provider: &'a dyn CalendarProvider) -> Self {
        OverlapDetector { provider }
    }

    pub async fn overlaps(
        &self,
        calendar: &CalendarHandle,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        buffer: Duration,
    ) -> SyncResult<bool> {
        Ok(self.find_overlap(calendar, start, end, buffer).await?.is_some())
    }

    /// Return the first existing entry that overlaps `[start, end]`.
    ///
    /// Entries of any busy status count. A zero-length candidate is looked up
    /// inclusively, since no entry strictly intersects an instant.
    pub async fn find_overlap(
        &self,
        calendar: &CalendarHandle,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        buffer: Duration,
    ) -> SyncResult<Option<Event>> {
        let filter = if start == end {
            IntervalFilter::Touching {
                from: start,
                to: end,
            }
        } else {
            IntervalFilter::Intersecting {
                from: start,
                to: end,
            }
        };

        let existing = self
            .provider
            .query_events(calendar, &filter, true)
            .await
            .map_err(|e| match e {
                SyncError::ProviderQuery(_) => e,
                other => SyncError::ProviderQuery(other.to_string()),
            })?;

        let conflict = existing
            .into_iter()
            .find(|entry| intervals_overlap(entry.start, entry.end, start, end, buffer));

        if let Some(ref entry) = conflict {
            debug!(
                calendar = %calendar,
                entry_id = %entry.id,
                subject = %entry.subject,
                "overlap found"
            );
        }

        Ok(conflict)
    }
}

/// The overlap predicate between one existing entry and a candidate.
///
/// True when any of:
/// 1. the existing interval widened by `buffer` on both ends contains the candidate
/// 2. the existing interval contains the candidate
/// 3. the existing interval starts inside the candidate
///
/// Clause 2 is implied by clause 1 whenever `buffer` is non-negative. It is
/// kept so a negative buffer still treats exact containment as an overlap.
pub fn intervals_overlap(
    existing_start: DateTime<Utc>,
    existing_end: DateTime<Utc>,
    candidate_start: DateTime<Utc>,
    candidate_end: DateTime<Utc>,
    buffer: Duration,
) -> bool {
    let buffered_containment = shift(existing_start, -buffer) <= candidate_start
        && shift(existing_end, buffer) >= candidate_end;
    let exact_containment = existing_start <= candidate_start && existing_end >= candidate_end;
    let starts_inside = existing_start >= candidate_start && existing_start <= candidate_end;

    buffered_containment || exact_containment || starts_inside
}

/// `at + by`, saturating at the ends of the representable range.
fn shift(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(if by < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
