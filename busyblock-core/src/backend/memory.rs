//! In-process calendar store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::event::{BusyBlock, Event, NewBusyBlock};
use crate::provider::{CalendarHandle, CalendarProvider, IntervalFilter};

type CalendarKey = (String, String);

/// Calendars held in memory, keyed by account and calendar name.
///
/// Created blocks are stored as plain events with subject "Busy", so they
/// show up in later queries exactly like blocks on a real provider.
#[derive(Default)]
pub struct MemoryProvider {
    calendars: Mutex<HashMap<CalendarKey, Vec<Event>>>,
    next_block_id: AtomicU64,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(self, account: &str, calendar: &str) -> Self {
        self.lock()
            .entry((account.to_string(), calendar.to_string()))
            .or_default();
        self
    }

    /// Add an event to an existing or new calendar.
    pub fn insert_event(&self, account: &str, calendar: &str, event: Event) {
        self.lock()
            .entry((account.to_string(), calendar.to_string()))
            .or_default()
            .push(event);
    }

    /// Every event on a calendar, in insertion order.
    pub fn events(&self, account: &str, calendar: &str) -> Vec<Event> {
        self.lock()
            .get(&(account.to_string(), calendar.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CalendarKey, Vec<Event>>> {
        // A poisoned lock only means another test thread panicked mid-insert
        self.calendars
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(calendar: &CalendarHandle) -> CalendarKey {
        (calendar.account.clone(), calendar.calendar.clone())
    }
}

#[async_trait]
impl CalendarProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn resolve_calendar(
        &self,
        account: &str,
        calendar: &str,
    ) -> SyncResult<CalendarHandle> {
        let key = (account.to_string(), calendar.to_string());
        if !self.lock().contains_key(&key) {
            return Err(SyncError::CalendarNotFound {
                account: account.to_string(),
                calendar: calendar.to_string(),
            });
        }

        Ok(CalendarHandle {
            id: format!("{}/{}", account, calendar),
            account: account.to_string(),
            calendar: calendar.to_string(),
        })
    }

    async fn query_events(
        &self,
        calendar: &CalendarHandle,
        filter: &IntervalFilter,
        _expand_recurrences: bool,
    ) -> SyncResult<Vec<Event>> {
        let calendars = self.lock();
        let events = calendars.get(&Self::key(calendar)).ok_or_else(|| {
            SyncError::ProviderQuery(format!("Calendar '{}' disappeared", calendar))
        })?;

        let mut matching: Vec<Event> = events
            .iter()
            .filter(|e| filter.matches(e.start, e.end))
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.start);

        Ok(matching)
    }

    async fn create_entry(
        &self,
        calendar: &CalendarHandle,
        block: &NewBusyBlock,
    ) -> SyncResult<BusyBlock> {
        let id = format!("busy-{}", self.next_block_id.fetch_add(1, Ordering::SeqCst) + 1);

        let mut calendars = self.lock();
        let events = calendars
            .get_mut(&Self::key(calendar))
            .ok_or_else(|| SyncError::Write(format!("Calendar '{}' disappeared", calendar)))?;

        events.push(
            Event::new(&id, &block.subject, block.start, block.end).with_status(block.status),
        );

        Ok(BusyBlock {
            id,
            block: block.clone(),
        })
    }
}
