//! The sync run: read the source window, mirror each event that has no
//! overlapping entry on the target.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::SyncResult;
use crate::event::Event;
use crate::overlap::OverlapDetector;
use crate::provider::{CalendarHandle, CalendarProvider, CalendarRef};
use crate::report::{EventOutcome, Outcome, SkipReason, SyncReport};
use crate::source::EventSource;
use crate::window::SyncWindow;
use crate::writer::BlockWriter;

pub struct SyncEngine {
    provider: Arc<dyn CalendarProvider>,
}

impl SyncEngine {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        SyncEngine { provider }
    }

    /// Mirror every source event in `window` onto `target`.
    ///
    /// Both calendars are resolved before anything is read. Events are
    /// processed one at a time in start order, so a block booked for one event
    /// is visible to the overlap check of the next. Once events are fetched,
    /// every failure is recorded against its event and the run continues.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn run(
        &self,
        source: &CalendarRef,
        target: &CalendarRef,
        window: &SyncWindow,
        buffer: Duration,
    ) -> SyncResult<SyncReport> {
        let provider = self.provider.as_ref();

        let source_handle = provider
            .resolve_calendar(&source.account, &source.calendar)
            .await?;
        let target_handle = provider
            .resolve_calendar(&target.account, &target.calendar)
            .await?;

        let events = EventSource::new(provider)
            .fetch(&source_handle, window)
            .await?;
        info!(count = events.len(), "processing source events");

        let detector = OverlapDetector::new(provider);
        let writer = BlockWriter::new(provider);
        let mut report = SyncReport::default();

        for event in &events {
            let processed = process_event(&detector, &writer, &target_handle, event, buffer).await;
            let outcome = match processed {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        event_id = %event.id,
                        subject = %event.subject,
                        error = %e,
                        "event failed"
                    );
                    Outcome::Failed(e)
                }
            };
            report.push(EventOutcome::new(event, outcome));
        }

        info!(
            booked = report.booked(),
            skipped = report.skipped(),
            failed = report.failed(),
            "sync complete"
        );
        Ok(report)
    }
}

async fn process_event(
    detector: &OverlapDetector<'_>,
    writer: &BlockWriter<'_>,
    target: &CalendarHandle,
    event: &Event,
    buffer: Duration,
) -> SyncResult<Outcome> {
    let (start, end) = event.interval()?;

    if let Some(conflict) = detector.find_overlap(target, start, end, buffer).await? {
        debug!(event_id = %event.id, conflict_id = %conflict.id, "skipping, already covered");
        return Ok(Outcome::Skipped(SkipReason::conflict_with(&conflict)));
    }

    let block = writer.create(target, event).await?;
    Ok(Outcome::Booked { block_id: block.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryProvider;
    use crate::error::SyncError;
    use crate::event::{BusyBlock, BusyStatus, NewBusyBlock};
    use crate::provider::IntervalFilter;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::Tz;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WORK: &str = "user@workemail.com";
    const HOME: &str = "user@personalemail.com";
    const CAL: &str = "Calendar";

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap()
    }

    fn june() -> SyncWindow {
        SyncWindow::from_args(Some("2024-06-01"), Some("2024-07-01"), 30, Tz::UTC).unwrap()
    }

    fn refs() -> (CalendarRef, CalendarRef) {
        (CalendarRef::new(WORK, CAL), CalendarRef::new(HOME, CAL))
    }

    fn provider_with(events: Vec<Event>) -> Arc<MemoryProvider> {
        let provider = MemoryProvider::new()
            .with_calendar(WORK, CAL)
            .with_calendar(HOME, CAL);
        for event in events {
            provider.insert_event(WORK, CAL, event);
        }
        Arc::new(provider)
    }

    async fn run(engine: &SyncEngine) -> SyncResult<SyncReport> {
        let (source, target) = refs();
        engine
            .run(&source, &target, &june(), Duration::seconds(60))
            .await
    }

    /// Fails writes for one subject, one query by index, or every query from an index on.
    struct Faulty {
        inner: MemoryProvider,
        fail_write_subject: Option<String>,
        fail_query_at: Option<usize>,
        fail_queries_after: Option<usize>,
        queries: AtomicUsize,
    }

    impl Faulty {
        fn new(inner: MemoryProvider) -> Self {
            Faulty {
                inner,
                fail_write_subject: None,
                fail_query_at: None,
                fail_queries_after: None,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CalendarProvider for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        async fn resolve_calendar(
            &self,
            account: &str,
            calendar: &str,
        ) -> SyncResult<CalendarHandle> {
            self.inner.resolve_calendar(account, calendar).await
        }

        async fn query_events(
            &self,
            calendar: &CalendarHandle,
            filter: &IntervalFilter,
            expand_recurrences: bool,
        ) -> SyncResult<Vec<Event>> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_query_at == Some(n)
                || self.fail_queries_after.is_some_and(|limit| n >= limit)
            {
                return Err(SyncError::Provider("connection reset".into()));
            }
            self.inner
                .query_events(calendar, filter, expand_recurrences)
                .await
        }

        async fn create_entry(
            &self,
            calendar: &CalendarHandle,
            block: &NewBusyBlock,
        ) -> SyncResult<BusyBlock> {
            if self
                .fail_write_subject
                .as_ref()
                .is_some_and(|s| block.body.ends_with(s.as_str()))
            {
                return Err(SyncError::Provider("permission denied".into()));
            }
            self.inner.create_entry(calendar, block).await
        }
    }

    #[tokio::test]
    async fn test_june_scenario_books_once_then_skips() {
        let provider = provider_with(vec![Event::new(
            "evt-1",
            "Design review",
            utc(10, 14, 0),
            utc(10, 15, 0),
        )]);
        let engine = SyncEngine::new(provider.clone());

        let first = run(&engine).await.unwrap();
        assert_eq!((first.booked(), first.skipped(), first.failed()), (1, 0, 0));

        let blocks = provider.events(HOME, CAL);
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].start, blocks[0].end), (utc(10, 14, 0), utc(10, 15, 0)));

        let second = run(&engine).await.unwrap();
        assert_eq!((second.booked(), second.skipped()), (0, 1));
        assert_eq!(provider.events(HOME, CAL).len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_creates_no_blocks() {
        let provider = provider_with(vec![
            Event::new("a", "Standup", utc(3, 9, 0), utc(3, 9, 15)),
            Event::new("b", "Planning", utc(3, 9, 15), utc(3, 10, 0)),
            Event::new("c", "Offsite", utc(12, 0, 0), utc(13, 0, 0)),
            Event::new("d", "Lunch", utc(20, 12, 0), utc(20, 13, 0)),
            Event::new("e", "Lunch overlap", utc(20, 12, 30), utc(20, 13, 30)),
        ]);
        let engine = SyncEngine::new(provider.clone());

        run(&engine).await.unwrap();
        let after_first = provider.events(HOME, CAL).len();
        let second = run(&engine).await.unwrap();

        assert_eq!(second.booked(), 0);
        assert_eq!(second.skipped(), second.total());
        assert_eq!(provider.events(HOME, CAL).len(), after_first);
    }

    #[tokio::test]
    async fn test_every_uncovered_event_gets_an_exact_block() {
        let events = vec![
            Event::new("a", "Standup", utc(3, 9, 0), utc(3, 9, 15)),
            Event::new("b", "Planning", utc(3, 9, 15), utc(3, 10, 0)),
            Event::new("c", "1:1", utc(4, 16, 0), utc(4, 16, 30)),
        ];
        let provider = provider_with(events.clone());
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();
        assert_eq!(report.booked(), 3);

        let blocks = provider.events(HOME, CAL);
        for event in &events {
            assert!(
                blocks
                    .iter()
                    .any(|b| b.start == event.start && b.end == event.end),
                "no block for {}",
                event.id
            );
        }
    }

    #[tokio::test]
    async fn test_events_booked_earlier_in_the_run_block_later_overlaps() {
        // Same meeting in the source twice; the second sees the first's block
        let provider = provider_with(vec![
            Event::new("a", "All hands", utc(5, 17, 0), utc(5, 18, 0)),
            Event::new("b", "All hands (copy)", utc(5, 17, 0), utc(5, 18, 0)),
        ]);
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();

        assert!(matches!(report.outcome_for("a"), Some(Outcome::Booked { .. })));
        assert!(matches!(report.outcome_for("b"), Some(Outcome::Skipped(_))));
        assert_eq!(provider.events(HOME, CAL).len(), 1);
    }

    #[tokio::test]
    async fn test_events_outside_the_window_are_not_processed() {
        let provider = provider_with(vec![
            Event::new(
                "before",
                "Straddles start",
                utc(1, 0, 0) - Duration::minutes(30),
                utc(1, 1, 0),
            ),
            Event::new(
                "after",
                "Straddles end",
                utc(30, 23, 0),
                utc(30, 23, 0) + Duration::hours(2),
            ),
            Event::new("inside", "Inside", utc(15, 10, 0), utc(15, 11, 0)),
        ]);
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();

        assert_eq!(report.total(), 1);
        assert!(report.outcome_for("before").is_none());
        assert!(report.outcome_for("after").is_none());
    }

    #[tokio::test]
    async fn test_pre_existing_target_entry_is_reported_as_conflict() {
        let provider = provider_with(vec![Event::new(
            "evt-1",
            "Design review",
            utc(10, 14, 0),
            utc(10, 15, 0),
        )]);
        provider.insert_event(
            HOME,
            CAL,
            Event::new("dentist", "Dentist", utc(10, 13, 30), utc(10, 15, 30)),
        );
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();

        match report.outcome_for("evt-1") {
            Some(Outcome::Skipped(SkipReason::Conflict {
                entry_id, subject, ..
            })) => {
                assert_eq!(entry_id, "dentist");
                assert_eq!(subject, "Dentist");
            }
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_one_failed_write_does_not_stop_the_run() {
        let inner = MemoryProvider::new()
            .with_calendar(WORK, CAL)
            .with_calendar(HOME, CAL);
        inner.insert_event(WORK, CAL, Event::new("1", "First", utc(3, 9, 0), utc(3, 10, 0)));
        inner.insert_event(WORK, CAL, Event::new("2", "Second", utc(4, 9, 0), utc(4, 10, 0)));
        inner.insert_event(WORK, CAL, Event::new("3", "Third", utc(5, 9, 0), utc(5, 10, 0)));
        inner.insert_event(HOME, CAL, Event::new("x", "Gym", utc(5, 9, 0), utc(5, 10, 0)));
        let mut provider = Faulty::new(inner);
        provider.fail_write_subject = Some("Second".into());
        let engine = SyncEngine::new(Arc::new(provider));

        let report = run(&engine).await.unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.outcome_for("1"), Some(Outcome::Booked { .. })));
        assert!(matches!(
            report.outcome_for("2"),
            Some(Outcome::Failed(SyncError::Write(_)))
        ));
        assert!(matches!(report.outcome_for("3"), Some(Outcome::Skipped(_))));
    }

    #[tokio::test]
    async fn test_inverted_event_fails_alone() {
        let provider = provider_with(vec![
            Event::new("ok", "Fine", utc(3, 9, 0), utc(3, 10, 0)),
            Event::new("bad", "Backwards", utc(4, 10, 0), utc(4, 9, 0)),
        ]);
        let engine = SyncEngine::new(provider);

        let report = run(&engine).await.unwrap();

        assert_eq!(report.booked(), 1);
        assert!(matches!(
            report.outcome_for("bad"),
            Some(Outcome::Failed(SyncError::InvalidInterval { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_calendar_aborts_before_reading_events() {
        let provider = Arc::new(MemoryProvider::new().with_calendar(WORK, CAL));
        let engine = SyncEngine::new(provider);

        let err = run(&engine).await.unwrap_err();

        assert!(matches!(err, SyncError::CalendarNotFound { account, .. } if account == HOME));
    }

    #[tokio::test]
    async fn test_source_query_failure_is_fatal() {
        let inner = MemoryProvider::new()
            .with_calendar(WORK, CAL)
            .with_calendar(HOME, CAL);
        let mut provider = Faulty::new(inner);
        provider.fail_queries_after = Some(0);
        let engine = SyncEngine::new(Arc::new(provider));

        let err = run(&engine).await.unwrap_err();

        assert!(matches!(err, SyncError::ProviderQuery(_)));
    }

    #[tokio::test]
    async fn test_failed_overlap_query_fails_only_that_event() {
        let inner = MemoryProvider::new()
            .with_calendar(WORK, CAL)
            .with_calendar(HOME, CAL);
        inner.insert_event(WORK, CAL, Event::new("1", "First", utc(3, 9, 0), utc(3, 10, 0)));
        inner.insert_event(WORK, CAL, Event::new("2", "Second", utc(4, 9, 0), utc(4, 10, 0)));
        inner.insert_event(WORK, CAL, Event::new("3", "Third", utc(5, 9, 0), utc(5, 10, 0)));
        let mut provider = Faulty::new(inner);
        // Query 0 reads the source, query 2 is the overlap check for event 2
        provider.fail_query_at = Some(2);
        let provider = Arc::new(provider);
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!((report.booked(), report.failed()), (2, 1));
        assert!(matches!(
            report.outcome_for("2"),
            Some(Outcome::Failed(SyncError::ProviderQuery(_)))
        ));
        assert!(matches!(report.outcome_for("3"), Some(Outcome::Booked { .. })));
        assert_eq!(provider.inner.events(HOME, CAL).len(), 2);
    }

    #[tokio::test]
    async fn test_zero_length_event_is_booked_once() {
        let provider = provider_with(vec![Event::new(
            "deadline",
            "Deadline",
            utc(11, 17, 0),
            utc(11, 17, 0),
        )]);
        let engine = SyncEngine::new(provider.clone());

        let first = run(&engine).await.unwrap();
        let second = run(&engine).await.unwrap();
        let third = run(&engine).await.unwrap();

        assert_eq!(first.booked(), 1);
        assert_eq!((second.booked(), third.booked()), (0, 0));
        assert_eq!(provider.events(HOME, CAL).len(), 1);
    }

    #[tokio::test]
    async fn test_free_source_events_are_not_mirrored() {
        let provider = provider_with(vec![
            Event::new("focus", "Focus time", utc(3, 9, 0), utc(3, 11, 0))
                .with_status(BusyStatus::Free),
            Event::new("review", "Review", utc(3, 14, 0), utc(3, 15, 0)),
        ]);
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();

        assert_eq!(report.total(), 1);
        assert!(report.outcome_for("focus").is_none());
        assert_eq!(provider.events(HOME, CAL).len(), 1);
    }

    #[tokio::test]
    async fn test_free_target_entry_still_covers_an_event() {
        let provider = provider_with(vec![Event::new(
            "review",
            "Review",
            utc(3, 14, 0),
            utc(3, 15, 0),
        )]);
        provider.insert_event(
            HOME,
            CAL,
            Event::new("hold", "Tentative hold", utc(3, 13, 0), utc(3, 16, 0))
                .with_status(BusyStatus::Free),
        );
        let engine = SyncEngine::new(provider.clone());

        let report = run(&engine).await.unwrap();

        assert!(matches!(
            report.outcome_for("review"),
            Some(Outcome::Skipped(SkipReason::Conflict { entry_id, .. })) if entry_id == "hold"
        ));
        assert_eq!(provider.events(HOME, CAL).len(), 1);
    }
}
