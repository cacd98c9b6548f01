//! Creating busy blocks.

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::event::{BusyBlock, Event, NewBusyBlock};
use crate::provider::{CalendarHandle, CalendarProvider};

pub struct BlockWriter<'a> {
    provider: &'a dyn CalendarProvider,
}

impl<'a> BlockWriter<'a> {
    pub fn new(provider: &'a dyn CalendarProvider) -> Self {
        BlockWriter { provider }
    }

    /// Persist a busy block covering exactly `event`'s interval.
    pub async fn create(&self, calendar: &CalendarHandle, event: &Event) -> SyncResult<BusyBlock> {
        let block = NewBusyBlock::for_event(event);

        let created = self
            .provider
            .create_entry(calendar, &block)
            .await
            .map_err(|e| match e {
                SyncError::Write(_) => e,
                other => SyncError::Write(other.to_string()),
            })?;

        debug!(
            calendar = %calendar,
            block_id = %created.id,
            event_id = %event.id,
            "booked busy block"
        );
        Ok(created)
    }
}
