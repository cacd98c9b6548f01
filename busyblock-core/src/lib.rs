//! Core of busyblock: mirror the events of a source calendar as opaque
//! "Busy" blocks on a target calendar.
//!
//! - `provider` defines the `CalendarProvider` capability every backend implements
//! - `source`, `overlap` and `writer` are the three steps the `engine` composes
//! - `backend` holds the memory, ICS directory and subprocess providers

pub mod backend;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event;
pub mod overlap;
pub mod provider;
pub mod report;
pub mod source;
pub mod window;
pub mod writer;

pub use config::{BackendConfig, ConfigOverrides, SyncConfig};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use event::{BusyBlock, BusyStatus, Event, EventTime, NewBusyBlock};
pub use provider::{CalendarHandle, CalendarProvider, CalendarRef, IntervalFilter};
pub use report::{EventOutcome, Outcome, SkipReason, SyncReport};
pub use window::SyncWindow;
