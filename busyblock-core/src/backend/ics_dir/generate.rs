//! ICS generation for busy blocks.

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, EventLike};

use crate::event::{BusyStatus, NewBusyBlock};

const PRODID: &str = "PRODID:BUSYBLOCK";

/// Generate .ics content for a busy block
pub fn generate_ics(uid: &str, block: &NewBusyBlock) -> String {
    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(uid);
    ics_event.summary(&block.subject);
    ics_event.add_property("DTSTAMP", format_utc(Utc::now()));
    ics_event.add_property("DTSTART", format_utc(block.start));
    ics_event.add_property("DTEND", format_utc(block.end));
    ics_event.location(&block.location);
    ics_event.description(&block.body);

    let transp = match block.status {
        BusyStatus::Busy => "OPAQUE",
        BusyStatus::Free => "TRANSPARENT",
    };
    ics_event.add_property("TRANSP", transp);

    cal.push(ics_event.done());
    let cal = cal.done();

    cal.to_string()
        .lines()
        .map(|line| if line.starts_with("PRODID:") { PRODID } else { line })
        .collect::<Vec<_>>()
        .join("\r\n")
        + "\r\n"
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
