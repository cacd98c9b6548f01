//! ICS file parsing using the icalendar crate's parser.

use icalendar::{
    DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

use crate::event::{BusyStatus, EventTime};

/// A VEVENT as stored on disk, times still in their native form.
#[derive(Debug, Clone, PartialEq)]
pub struct IcsEvent {
    pub uid: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub cancelled: bool,
    pub transparency: BusyStatus,
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
    /// Set on instance overrides of a recurring event
    pub recurrence_id: Option<EventTime>,
}

/// Parse ICS content into an IcsEvent
pub fn parse_event(content: &str) -> Option<IcsEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());
    let start = to_event_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);

    // Without DTEND the end comes from DURATION. Failing that, an all-day
    // start lasts one day and a timed start has zero length (RFC 5545 3.6.1).
    let end = match vevent.find_prop("DTEND") {
        Some(prop) => to_event_time(DatePerhapsTime::try_from(prop).ok()?),
        None => match vevent.find_prop("DURATION") {
            Some(prop) => shift_event_time(&start, parse_duration(prop.val.as_ref())?)?,
            None => default_end(&start)?,
        },
    };

    let cancelled = vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref() == "CANCELLED");

    let transparency = vevent
        .find_prop("TRANSP")
        .map(|p| {
            if p.val == "TRANSPARENT" {
                BusyStatus::Free
            } else {
                BusyStatus::Busy
            }
        })
        .unwrap_or(BusyStatus::Busy);

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let exdates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();

    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time);

    Some(IcsEvent {
        uid,
        summary,
        start,
        end,
        cancelled,
        transparency,
        rrule,
        exdates,
        recurrence_id,
    })
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Parse an RFC 5545 DURATION value such as `PT1H` or `P1D`. Negative
/// durations are rejected.
fn parse_duration(value: &str) -> Option<chrono::Duration> {
    let value = value.trim();
    let value = value.strip_prefix('+').unwrap_or(value);

    let duration = iso8601::duration(value).ok()?;
    let std_duration: std::time::Duration = duration.into();
    chrono::Duration::from_std(std_duration).ok()
}

fn default_end(start: &EventTime) -> Option<EventTime> {
    match start {
        EventTime::Date(_) => shift_event_time(start, chrono::Duration::days(1)),
        _ => Some(start.clone()),
    }
}

/// Move `time` forward by `by`, keeping its representation. An all-day date
/// stays a date when `by` is a whole number of days.
fn shift_event_time(time: &EventTime, by: chrono::Duration) -> Option<EventTime> {
    Some(match time {
        EventTime::Date(d) => {
            if by.num_seconds() % 86_400 == 0 && by.subsec_nanos() == 0 {
                EventTime::Date(d.checked_add_signed(by)?)
            } else {
                EventTime::DateTimeFloating(
                    d.and_time(chrono::NaiveTime::MIN).checked_add_signed(by)?,
                )
            }
        }
        EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(dt.checked_add_signed(by)?),
        EventTime::DateTimeFloating(naive) => {
            EventTime::DateTimeFloating(naive.checked_add_signed(by)?)
        }
        EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
            datetime: datetime.checked_add_signed(by)?,
            tzid: tzid.clone(),
        },
    })
}

/// Parse an EXDATE property into a list of EventTime values.
///
/// Handles TZID and VALUE=DATE parameters, UTC and floating values, and
/// comma-separated lists.
fn parse_exdate_property(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if is_date {
                chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date)
            } else if let Some(ref tz) = tzid {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    })
            } else if let Some(s) = s.strip_suffix('Z') {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
            } else {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}
