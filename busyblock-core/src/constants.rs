use std::time::Duration;

/// Number of days covered by the default sync window, starting today.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Tolerance absorbing sub-minute precision mismatches between providers.
pub const DEFAULT_OVERLAP_BUFFER: Duration = Duration::from_secs(60);

/// Subject of every busy block.
pub const BUSY_SUBJECT: &str = "Busy";

/// Location stamped on every busy block.
pub const BUSY_LOCATION: &str = "Reserved by Automation";
