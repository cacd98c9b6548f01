//! Reading the source window.

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::event::{BusyStatus, Event};
use crate::provider::{CalendarHandle, CalendarProvider};
use crate::window::SyncWindow;

/// Reads the events of a calendar that fall entirely inside a window.
pub struct EventSource<'a> {
    provider: &'a dyn CalendarProvider,
}

impl<'a> EventSource<'a> {
    pub fn new(provider: &'a dyn CalendarProvider) -> Self {
        EventSource { provider }
    }

    /// Recurring events are expanded into their occurrences. Free events are
    /// dropped. The result is sorted by start; events with equal starts keep
    /// the provider's order.
    pub async fn fetch(
        &self,
        calendar: &CalendarHandle,
        window: &SyncWindow,
    ) -> SyncResult<Vec<Event>> {
        let mut events = self
            .provider
            .query_events(calendar, &window.filter(), true)
            .await
            .map_err(|e| match e {
                SyncError::CalendarNotFound { .. } | SyncError::ProviderQuery(_) => e,
                other => SyncError::ProviderQuery(other.to_string()),
            })?;

        let returned = events.len();
        events.retain(|event| event.status == BusyStatus::Busy && window.contains(event));
        events.sort_by_key(|event| event.start);

        debug!(
            calendar = %calendar,
            returned,
            kept = events.len(),
            "fetched source window"
        );

        Ok(events)
    }
}
