//! TUI rendering traits for busyblock types.
//!
//! Extension traits that add colored terminal rendering to busyblock-core
//! types using owo_colors.

use busyblock_core::event::render_interval;
use busyblock_core::provider::CalendarRef;
use busyblock_core::report::{EventOutcome, Outcome, SkipReason, SyncReport};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for EventOutcome {
    fn render(&self) -> String {
        let time = render_interval(self.start, self.end);

        match &self.outcome {
            Outcome::Booked { .. } => {
                format!("{} {} {}", "+".green(), self.subject.green(), time.dimmed())
            }
            Outcome::Skipped(SkipReason::Conflict { subject, .. }) => format!(
                "{} {} {} {}",
                "=".dimmed(),
                self.subject.dimmed(),
                time.dimmed(),
                format!("(overlaps \"{}\")", subject).dimmed()
            ),
            Outcome::Failed(e) => format!(
                "{} {} {} {}",
                "!".red(),
                self.subject.red(),
                time.dimmed(),
                e.to_string().red()
            ),
        }
    }
}

impl Render for CalendarRef {
    fn render(&self) -> String {
        format!("📅 {}", self)
    }
}

/// Threshold for compact view (show counts instead of individual events)
const COMPACT_THRESHOLD: usize = 5;

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Booked,
    Skipped,
    Failed,
}

fn kind_of(outcome: &Outcome) -> Kind {
    match outcome {
        Outcome::Booked { .. } => Kind::Booked,
        Outcome::Skipped(_) => Kind::Skipped,
        Outcome::Failed(_) => Kind::Failed,
    }
}

fn render_outcome_list(
    entries: &[&EventOutcome],
    kind: Kind,
    verbose: bool,
    lines: &mut Vec<String>,
) {
    if entries.is_empty() {
        return;
    }

    if verbose || entries.len() <= COMPACT_THRESHOLD {
        for entry in entries {
            lines.push(format!("   {}", entry.render()));
        }
        return;
    }

    let count = entries.len();
    let noun = pluralize("event", count);
    match kind {
        Kind::Booked => {
            let label = format!("({} {} booked)", count, noun);
            lines.push(format!("   {} {}", "+".green(), label.green()));
        }
        Kind::Skipped => {
            let label = format!("({} {} already covered)", count, noun);
            lines.push(format!("   {} {}", "=".dimmed(), label.dimmed()));
        }
        Kind::Failed => {
            let label = format!("({} {} failed, rerun with -v for details)", count, noun);
            lines.push(format!("   {} {}", "!".red(), label.red()));
        }
    }
}

/// Simple pluralization helper
fn pluralize(word: &str, count: usize) -> &str {
    if count == 1 {
        word
    } else {
        match word {
            "event" => "events",
            "block" => "blocks",
            _ => word,
        }
    }
}

pub trait SyncReportRender {
    fn render(&self, verbose: bool) -> String;
    fn render_summary(&self) -> String;
}

impl SyncReportRender for SyncReport {
    fn render(&self, verbose: bool) -> String {
        if self.is_empty() {
            return "   No events in window".dimmed().to_string();
        }

        let mut lines = Vec::new();
        for kind in [Kind::Booked, Kind::Skipped, Kind::Failed] {
            let entries: Vec<&EventOutcome> = self
                .entries
                .iter()
                .filter(|e| kind_of(&e.outcome) == kind)
                .collect();
            render_outcome_list(&entries, kind, verbose, &mut lines);
        }

        lines.join("\n")
    }

    fn render_summary(&self) -> String {
        let booked = self.booked();
        format!(
            "Booked {} {}, {} skipped, {} failed",
            booked,
            pluralize("block", booked),
            self.skipped(),
            self.failed()
        )
    }
}
