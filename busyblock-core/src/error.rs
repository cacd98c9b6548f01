//! Error types for busyblock.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while resolving, reading or writing calendars.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar '{calendar}' not found for account '{account}'")]
    CalendarNotFound { account: String, calendar: String },

    #[error("Provider query failed: {0}")]
    ProviderQuery(String),

    #[error("Failed to write busy block: {0}")]
    Write(String),

    #[error("Invalid event interval: end {end} is before start {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Time conversion error: {0}")]
    Time(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for busyblock operations.
pub type SyncResult<T> = Result<T, SyncError>;
