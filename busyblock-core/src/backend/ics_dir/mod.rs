//! Calendars stored as directories of `.ics` files.
//!
//! Layout: `<root>/<account>/<calendar>/*.ics`, one VEVENT per file.

mod generate;
mod parse;
mod recurrence;

pub use parse::{IcsEvent, parse_event};
pub use recurrence::{expand_recurring_event, instance_id};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::event::{BusyBlock, Event, NewBusyBlock};
use crate::provider::{CalendarHandle, CalendarProvider, IntervalFilter};

pub struct IcsDirProvider {
    root: PathBuf,
    /// Zone for floating times and all-day dates
    floating: Tz,
}

impl IcsDirProvider {
    pub fn new(root: impl Into<PathBuf>, floating: Tz) -> Self {
        IcsDirProvider {
            root: root.into(),
            floating,
        }
    }

    fn calendar_path(&self, account: &str, calendar: &str) -> PathBuf {
        self.root.join(account).join(calendar)
    }

    /// Parse every .ics file in `dir`. Unreadable or unparseable files are skipped.
    fn load(&self, dir: &Path) -> SyncResult<Vec<IcsEvent>> {
        let entries = std::fs::read_dir(dir)?;

        let events = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "ics"))
            .filter_map(|path| {
                let parsed = std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|content| parse_event(&content));
                if parsed.is_none() {
                    warn!(path = %path.display(), "skipping unparseable event file");
                }
                parsed
            })
            .collect();

        Ok(events)
    }

    /// Normalize and expand stored VEVENTs into the events matching `filter`.
    fn occurrences(
        &self,
        stored: &[IcsEvent],
        filter: &IntervalFilter,
        expand_recurrences: bool,
    ) -> Vec<Event> {
        let (from, to) = filter.bounds();

        let mut overrides: HashMap<&str, Vec<&IcsEvent>> = HashMap::new();
        for event in stored.iter().filter(|e| e.recurrence_id.is_some()) {
            overrides.entry(event.uid.as_str()).or_default().push(event);
        }

        let mut events = Vec::new();

        for event in stored.iter().filter(|e| e.recurrence_id.is_none()) {
            if event.cancelled {
                continue;
            }

            let expanded = if expand_recurrences && event.rrule.is_some() {
                let instances = overrides
                    .get(event.uid.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                expand_recurring_event(event, instances, self.floating, from, to)
            } else {
                self.single(event).map(|e| vec![e])
            };

            match expanded {
                Ok(occurrences) => events.extend(
                    occurrences
                        .into_iter()
                        .filter(|e| filter.matches(e.start, e.end)),
                ),
                Err(e) => warn!(uid = %event.uid, error = %e, "skipping event"),
            }
        }

        events.sort_by_key(|e| e.start);
        events
    }

    fn single(&self, event: &IcsEvent) -> SyncResult<Event> {
        let event_out = Event::new(
            &event.uid,
            &event.summary,
            event.start.to_utc(self.floating)?,
            event.end.to_utc(self.floating)?,
        );
        Ok(event_out.with_status(event.transparency))
    }

    /// `YYYY-MM-DDTHHMM__busy`, with `-2`, `-3`, ... appended on collision.
    fn unique_file_stem(dir: &Path, start: DateTime<Utc>, subject: &str) -> SyncResult<String> {
        let base = format!("{}__{}", start.format("%Y-%m-%dT%H%M"), slug::slugify(subject));

        if !dir.join(format!("{}.ics", base)).exists() {
            return Ok(base);
        }

        for n in 2..=100 {
            let suffixed = format!("{}-{}", base, n);
            if !dir.join(format!("{}.ics", suffixed)).exists() {
                return Ok(suffixed);
            }
        }

        Err(SyncError::Write(format!(
            "Too many file name collisions for '{}'",
            base
        )))
    }
}

#[async_trait]
impl CalendarProvider for IcsDirProvider {
    fn name(&self) -> &str {
        "ics"
    }

    async fn resolve_calendar(
        &self,
        account: &str,
        calendar: &str,
    ) -> SyncResult<CalendarHandle> {
        let path = self.calendar_path(account, calendar);
        if !path.is_dir() {
            return Err(SyncError::CalendarNotFound {
                account: account.to_string(),
                calendar: calendar.to_string(),
            });
        }

        Ok(CalendarHandle {
            id: path.to_string_lossy().into_owned(),
            account: account.to_string(),
            calendar: calendar.to_string(),
        })
    }

    async fn query_events(
        &self,
        calendar: &CalendarHandle,
        filter: &IntervalFilter,
        expand_recurrences: bool,
    ) -> SyncResult<Vec<Event>> {
        let stored = self
            .load(Path::new(&calendar.id))
            .map_err(|e| SyncError::ProviderQuery(format!("{}: {}", calendar, e)))?;
        let events = self.occurrences(&stored, filter, expand_recurrences);
        debug!(
            calendar = %calendar,
            files = stored.len(),
            matched = events.len(),
            "queried ics directory"
        );
        Ok(events)
    }

    async fn create_entry(
        &self,
        calendar: &CalendarHandle,
        block: &NewBusyBlock,
    ) -> SyncResult<BusyBlock> {
        let dir = Path::new(&calendar.id);
        if !dir.is_dir() {
            return Err(SyncError::Write(format!("{} is not a directory", dir.display())));
        }

        let uid = format!("{}@busyblock", uuid::Uuid::new_v4());
        let stem = Self::unique_file_stem(dir, block.start, &block.subject)?;
        let path = dir.join(format!("{}.ics", stem));

        std::fs::write(&path, generate::generate_ics(&uid, block))
            .map_err(|e| SyncError::Write(format!("{}: {}", path.display(), e)))?;

        Ok(BusyBlock {
            id: uid,
            block: block.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncEngine;
    use crate::event::BusyStatus;
    use crate::provider::CalendarRef;
    use crate::window::SyncWindow;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap()
    }

    fn write_ics(dir: &Path, name: &str, props: &[&str]) {
        let content = format!(
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nBEGIN:VEVENT\n{}\nEND:VEVENT\n\
             END:VCALENDAR\n",
            props.join("\n")
        );
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work@example.com").join("Calendar");
        let home = root.path().join("me@example.com").join("Calendar");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::create_dir_all(&home).unwrap();
        (root, work, home)
    }

    fn june() -> IntervalFilter {
        IntervalFilter::Within {
            from: utc(1, 0, 0),
            to: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_directory_is_calendar_not_found() {
        let (root, _, _) = setup();
        let provider = IcsDirProvider::new(root.path(), Tz::UTC);

        let err = provider
            .resolve_calendar("work@example.com", "Holidays")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::CalendarNotFound { .. }));
    }

    #[tokio::test]
    async fn test_query_skips_cancelled_and_broken_files() {
        let (root, work, _) = setup();
        write_ics(&work, "a.ics", &["UID:a", "DTSTART:20240610T140000Z", "DTEND:20240610T150000Z"]);
        write_ics(
            &work,
            "b.ics",
            &["UID:b", "DTSTART:20240610T120000Z", "DTEND:20240610T130000Z", "TRANSP:TRANSPARENT"],
        );
        write_ics(
            &work,
            "c.ics",
            &["UID:c", "DTSTART:20240611T120000Z", "DTEND:20240611T130000Z", "STATUS:CANCELLED"],
        );
        write_ics(
            &work,
            "d.ics",
            &[
                "UID:d",
                "DTSTART;TZID=Mars/Base:20240611T120000",
                "DTEND;TZID=Mars/Base:20240611T130000",
            ],
        );
        std::fs::write(work.join("e.ics"), "garbage").unwrap();
        std::fs::write(work.join("notes.txt"), "not an event").unwrap();
        let provider = IcsDirProvider::new(root.path(), Tz::UTC);
        let handle = provider.resolve_calendar("work@example.com", "Calendar").await.unwrap();

        let events = provider.query_events(&handle, &june(), true).await.unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(events[0].status, BusyStatus::Free);
        assert_eq!(events[1].status, BusyStatus::Busy);
        assert_eq!((events[1].start, events[1].end), (utc(10, 14, 0), utc(10, 15, 0)));
    }

    #[tokio::test]
    async fn test_recurrences_expand_only_when_asked() {
        let (root, work, _) = setup();
        write_ics(
            &work,
            "standup.ics",
            &[
                "UID:standup",
                "SUMMARY:Standup",
                "DTSTART;TZID=Europe/Berlin:20240603T090000",
                "DTEND;TZID=Europe/Berlin:20240603T091500",
                "RRULE:FREQ=WEEKLY;BYDAY=MO;COUNT=3",
            ],
        );
        let provider = IcsDirProvider::new(root.path(), Tz::UTC);
        let handle = provider.resolve_calendar("work@example.com", "Calendar").await.unwrap();

        let expanded = provider.query_events(&handle, &june(), true).await.unwrap();
        let masters = provider.query_events(&handle, &june(), false).await.unwrap();

        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[2].start, utc(17, 7, 0));
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].id, "standup");
    }

    #[tokio::test]
    async fn test_created_blocks_land_as_files_and_collide_safely() {
        let (root, _, home) = setup();
        let provider = IcsDirProvider::new(root.path(), Tz::UTC);
        let handle = provider.resolve_calendar("me@example.com", "Calendar").await.unwrap();
        let event = Event::new("x", "Review", utc(10, 14, 0), utc(10, 15, 0));
        let block = NewBusyBlock::for_event(&event);

        provider.create_entry(&handle, &block).await.unwrap();
        provider.create_entry(&handle, &block).await.unwrap();

        assert!(home.join("2024-06-10T1400__busy.ics").exists());
        assert!(home.join("2024-06-10T1400__busy-2.ics").exists());

        let found = provider
            .query_events(
                &handle,
                &IntervalFilter::Intersecting { from: utc(10, 14, 0), to: utc(10, 15, 0) },
                true,
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|e| e.subject == "Busy"));
    }

    #[tokio::test]
    async fn test_full_sync_against_directories_is_idempotent() {
        let (root, work, home) = setup();
        write_ics(
            &work,
            "standup.ics",
            &[
                "UID:standup",
                "SUMMARY:Standup",
                "DTSTART:20240603T090000Z",
                "DTEND:20240603T091500Z",
                "RRULE:FREQ=DAILY;COUNT=3",
            ],
        );
        write_ics(
            &work,
            "review.ics",
            &["UID:review", "SUMMARY:Review", "DTSTART:20240610T140000Z", "DTEND:20240610T150000Z"],
        );
        let engine = SyncEngine::new(Arc::new(IcsDirProvider::new(root.path(), Tz::UTC)));
        let source = CalendarRef::new("work@example.com", "Calendar");
        let target = CalendarRef::new("me@example.com", "Calendar");
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let window = SyncWindow::new(utc(1, 0, 0), end).unwrap();

        let first = engine.run(&source, &target, &window, Duration::seconds(60)).await.unwrap();
        let second = engine.run(&source, &target, &window, Duration::seconds(60)).await.unwrap();

        assert_eq!(first.booked(), 4);
        assert_eq!((second.booked(), second.skipped()), (0, 4));
        assert_eq!(std::fs::read_dir(&home).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_open_ended_events_are_booked_once() {
        let (root, work, home) = setup();
        write_ics(&work, "call.ics", &["UID:call", "DTSTART:20240610T090000Z", "DURATION:PT45M"]);
        write_ics(&work, "deadline.ics", &["UID:deadline", "DTSTART:20240611T170000Z"]);
        write_ics(&work, "trip.ics", &["UID:trip", "DTSTART;VALUE=DATE:20240612"]);
        let provider = Arc::new(IcsDirProvider::new(root.path(), Tz::UTC));
        let engine = SyncEngine::new(provider.clone());
        let source = CalendarRef::new("work@example.com", "Calendar");
        let target = CalendarRef::new("me@example.com", "Calendar");
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let window = SyncWindow::new(utc(1, 0, 0), end).unwrap();

        let first = engine.run(&source, &target, &window, Duration::seconds(60)).await.unwrap();
        let second = engine.run(&source, &target, &window, Duration::seconds(60)).await.unwrap();

        assert_eq!(first.booked(), 3);
        assert_eq!((second.booked(), second.skipped()), (0, 3));
        assert_eq!(std::fs::read_dir(&home).unwrap().count(), 3);

        let handle = provider.resolve_calendar("me@example.com", "Calendar").await.unwrap();
        let mut blocks = provider.query_events(&handle, &june(), true).await.unwrap();
        blocks.sort_by_key(|b| b.start);
        let spans: Vec<_> = blocks.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(
            spans,
            vec![
                (utc(10, 9, 0), utc(10, 9, 45)),
                (utc(11, 17, 0), utc(11, 17, 0)),
                (utc(12, 0, 0), utc(13, 0, 0)),
            ]
        );
    }
}
