//! Defines the JSON protocol spoken between busyblock and provider binaries
//! over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::event::{BusyBlock, Event, NewBusyBlock};
use crate::provider::{CalendarHandle, IntervalFilter};

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ResolveCalendar,
    QueryEvents,
    CreateEntry,
}

/// Request sent from busyblock to provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from provider to busyblock.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

impl<T: Serialize> Response<T> {
    /// Encode a success response. Used by provider binaries.
    pub fn success(data: T) -> serde_json::Result<String> {
        serde_json::to_string(&Response::Success { data })
    }
}

impl Response<()> {
    /// Encode an error response. Used by provider binaries.
    pub fn error(msg: &str) -> serde_json::Result<String> {
        serde_json::to_string(&Response::<()>::Error {
            error: msg.to_string(),
        })
    }
}

/// Look up a calendar by account and name. `None` means it does not exist.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveCalendar {
    pub account: String,
    pub calendar: String,
}

impl ProviderCommand for ResolveCalendar {
    type Response = Option<CalendarHandle>;
    fn command() -> Command {
        Command::ResolveCalendar
    }
}

/// List events matching an interval filter, sorted by start.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryEvents {
    pub calendar: CalendarHandle,
    pub filter: IntervalFilter,
    pub expand_recurrences: bool,
}

impl ProviderCommand for QueryEvents {
    type Response = Vec<Event>;
    fn command() -> Command {
        Command::QueryEvents
    }
}

/// Create one busy block.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEntry {
    pub calendar: CalendarHandle,
    pub block: NewBusyBlock,
}

impl ProviderCommand for CreateEntry {
    type Response = BusyBlock;
    fn command() -> Command {
        Command::CreateEntry
    }
}
