//! Concrete calendar providers.

pub mod ics_dir;
pub mod memory;
pub mod subprocess;

use std::sync::Arc;

use chrono_tz::Tz;

use crate::config::BackendConfig;
use crate::error::{SyncError, SyncResult};
use crate::provider::CalendarProvider;
use ics_dir::IcsDirProvider;
use subprocess::SubprocessProvider;

/// Build the provider a backend config describes.
///
/// `floating` is the zone used for all-day and floating event times.
pub fn build_provider(
    backend: &BackendConfig,
    floating: Tz,
) -> SyncResult<Arc<dyn CalendarProvider>> {
    match backend {
        BackendConfig::Ics { .. } => {
            let root = backend
                .ics_root()
                .ok_or_else(|| SyncError::Config("ICS backend has no root".into()))?;
            Ok(Arc::new(IcsDirProvider::new(root, floating)))
        }
        BackendConfig::Provider { name } => {
            if name.trim().is_empty() {
                return Err(SyncError::Config("Provider backend needs a name".into()));
            }
            Ok(Arc::new(SubprocessProvider::from_name(name)))
        }
    }
}
