//! Per-event outcomes of a sync run.

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::event::Event;

/// Why an event was not mirrored.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// An existing entry on the target already covers the interval.
    Conflict {
        entry_id: String,
        subject: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl SkipReason {
    pub fn conflict_with(entry: &Event) -> Self {
        SkipReason::Conflict {
            entry_id: entry.id.clone(),
            subject: entry.subject.clone(),
            start: entry.start,
            end: entry.end,
        }
    }
}

/// Terminal state of one source event. Every event ends in exactly one.
#[derive(Debug)]
pub enum Outcome {
    Booked { block_id: String },
    Skipped(SkipReason),
    Failed(SyncError),
}

#[derive(Debug)]
pub struct EventOutcome {
    pub event_id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub outcome: Outcome,
}

impl EventOutcome {
    pub fn new(event: &Event, outcome: Outcome) -> Self {
        EventOutcome {
            event_id: event.id.clone(),
            subject: event.subject.clone(),
            start: event.start,
            end: event.end,
            outcome,
        }
    }
}

/// Processing-order list of outcomes plus aggregate counts.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<EventOutcome>,
}

impl SyncReport {
    pub fn push(&mut self, entry: EventOutcome) {
        self.entries.push(entry);
    }

    pub fn booked(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Booked { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outcome_for(&self, event_id: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|e| e.event_id == event_id)
            .map(|e| &e.outcome)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}
