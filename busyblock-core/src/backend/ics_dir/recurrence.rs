//! RRULE expansion for recurring events.
//!
//! Expands a master recurring event into concrete, UTC-normalized occurrences
//! within a date range, honouring EXDATEs and instance overrides.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::warn;

use crate::backend::ics_dir::parse::IcsEvent;
use crate::error::{SyncError, SyncResult};
use crate::event::{Event, EventTime};

/// Upper bound on generated occurrences per master event.
const MAX_OCCURRENCES: u16 = 1000;

/// Build an iCalendar-format RRULE string for the rrule crate parser.
///
/// Floating and all-day starts are anchored in `floating` so the occurrences
/// follow that zone's DST transitions.
fn build_rrule_string(start: &EventTime, rrule: &str, floating: Tz) -> String {
    let dtstart = match start {
        EventTime::Date(d) => {
            format!("DTSTART;TZID={}:{}T000000", floating.name(), d.format("%Y%m%d"))
        }
        EventTime::DateTimeUtc(dt) => {
            format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ"))
        }
        EventTime::DateTimeFloating(dt) => {
            format!("DTSTART;TZID={}:{}", floating.name(), dt.format("%Y%m%dT%H%M%S"))
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            format!("DTSTART;TZID={}:{}", tzid, datetime.format("%Y%m%dT%H%M%S"))
        }
    };

    format!("{}\nRRULE:{}", dtstart, rrule)
}

/// Id of one expanded occurrence: the master uid plus the occurrence start.
pub fn instance_id(uid: &str, start: DateTime<Utc>) -> String {
    format!("{}/{}", uid, start.format("%Y%m%dT%H%M%SZ"))
}

/// Expand `master` into occurrences that could intersect `[range_start, range_end]`.
///
/// - `overrides` are the VEVENTs sharing the master's uid that carry a
///   RECURRENCE-ID. An override replaces the generated occurrence it points
///   at; a cancelled override removes it.
/// - The caller applies the exact interval filter afterwards.
pub fn expand_recurring_event(
    master: &IcsEvent,
    overrides: &[&IcsEvent],
    floating: Tz,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> SyncResult<Vec<Event>> {
    let Some(rrule) = master.rrule.as_deref() else {
        return Ok(Vec::new());
    };

    let rrule_set: RRuleSet = build_rrule_string(&master.start, rrule, floating)
        .parse()
        .map_err(|e| {
            SyncError::IcsParse(format!(
                "Failed to parse RRULE for event '{}': {}",
                master.uid, e
            ))
        })?;

    let master_start = master.start.to_utc(floating)?;
    let duration = master.end.to_utc(floating)? - master_start;

    // Occurrences starting up to one duration early can still intersect the range.
    // after/before are exclusive, so widen by a second on each side.
    let tz: rrule::Tz = Utc.into();
    let after = (range_start - duration - Duration::seconds(1)).with_timezone(&tz);
    let before = (range_end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);
    if result.limited {
        warn!(uid = %master.uid, limit = MAX_OCCURRENCES, "recurrence expansion truncated");
    }

    let excluded: HashSet<DateTime<Utc>> = master
        .exdates
        .iter()
        .filter_map(|exdate| exdate.to_utc(floating).ok())
        .collect();

    let mut replaced: HashMap<DateTime<Utc>, &IcsEvent> = HashMap::new();
    for instance in overrides {
        if let Some(recurrence_id) = &instance.recurrence_id {
            match recurrence_id.to_utc(floating) {
                Ok(at) => {
                    replaced.insert(at, instance);
                }
                Err(e) => warn!(uid = %instance.uid, error = %e, "ignoring override"),
            }
        }
    }

    let mut events = Vec::new();

    for occ_dt in &result.dates {
        let occ_start = occ_dt.with_timezone(&Utc);
        if excluded.contains(&occ_start) {
            continue;
        }

        let id = instance_id(&master.uid, occ_start);

        match replaced.get(&occ_start) {
            Some(instance) => {
                if instance.cancelled {
                    continue;
                }
                events.push(
                    Event::new(
                        id,
                        instance.summary.clone(),
                        instance.start.to_utc(floating)?,
                        instance.end.to_utc(floating)?,
                    )
                    .with_status(instance.transparency),
                );
            }
            None => {
                events.push(
                    Event::new(id, master.summary.clone(), occ_start, occ_start + duration)
                        .with_status(master.transparency),
                );
            }
        }
    }

    Ok(events)
}
