//! Sync configuration.
//!
//! Values are layered: `~/.config/busyblock/config.toml`, then `BUSYBLOCK_*`
//! environment variables, then command-line overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_WINDOW_DAYS;
use crate::error::{SyncError, SyncResult};
use crate::provider::CalendarRef;

static DEFAULT_ICS_ROOT: &str = "~/calendar";
static DEFAULT_BUFFER: &str = "1m";
const ENV_PREFIX: &str = "BUSYBLOCK";

fn default_ics_root() -> PathBuf {
    PathBuf::from(DEFAULT_ICS_ROOT)
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

fn default_buffer() -> String {
    DEFAULT_BUFFER.to_string()
}

/// Where calendars are read from and busy blocks written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Directories of .ics files under `root/<account>/<calendar>/`.
    Ics {
        #[serde(default = "default_ics_root")]
        root: PathBuf,
    },
    /// An external `busyblock-provider-<name>` binary.
    Provider { name: String },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Ics {
            root: default_ics_root(),
        }
    }
}

impl BackendConfig {
    /// The ICS root with `~` expanded, if this is an ICS backend.
    pub fn ics_root(&self) -> Option<PathBuf> {
        match self {
            BackendConfig::Ics { root } => Some(PathBuf::from(
                shellexpand::tilde(&root.to_string_lossy()).into_owned(),
            )),
            BackendConfig::Provider { .. } => None,
        }
    }
}

/// Values given on the command line. They win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_account: Option<String>,
    pub target_account: Option<String>,
    pub calendar: Option<String>,
    pub window_days: Option<i64>,
    pub buffer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_account: Option<String>,

    /// Calendar folder name shared by both accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_calendar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_calendar: Option<String>,

    #[serde(default = "default_window_days")]
    pub window_days: i64,

    #[serde(default = "default_buffer")]
    pub buffer: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default)]
    pub backend: BackendConfig,
}

impl SyncConfig {
    pub fn config_path() -> SyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("busyblock");

        Ok(config_dir.join("config.toml"))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> SyncResult<()> {
        let contents = format!(
            "\
# busyblock configuration

# Account whose events are mirrored, and the account that receives busy blocks:
# source_account = \"user@workemail.com\"
# target_account = \"user@clientemail.com\"

# Calendar folder name used on both accounts, with optional per-side overrides:
# calendar = \"Calendar\"
# source_calendar = \"Work\"
# target_calendar = \"Client\"

# How many days ahead to sync:
# window_days = {}

# Tolerance when comparing event times across providers:
# buffer = \"{}\"

# Timezone for date arguments and floating times (defaults to the system zone):
# timezone = \"Europe/Berlin\"

# [backend]
# kind = \"ics\"
# root = \"{}\"
#
# [backend]
# kind = \"provider\"
# name = \"outlook\"
",
            DEFAULT_WINDOW_DAYS, DEFAULT_BUFFER, DEFAULT_ICS_ROOT
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| SyncError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Load the config at `path`, creating a commented default first if it is missing.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> SyncResult<Self> {
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("source_account", overrides.source_account.clone())
            .and_then(|b| b.set_override_option("target_account", overrides.target_account.clone()))
            .and_then(|b| b.set_override_option("calendar", overrides.calendar.clone()))
            .and_then(|b| b.set_override_option("window_days", overrides.window_days))
            .and_then(|b| b.set_override_option("buffer", overrides.buffer.clone()))
            .map_err(|e| SyncError::Config(e.to_string()))?
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn source(&self) -> SyncResult<CalendarRef> {
        self.calendar_ref("source", &self.source_account, &self.source_calendar)
    }

    pub fn target(&self) -> SyncResult<CalendarRef> {
        self.calendar_ref("target", &self.target_account, &self.target_calendar)
    }

    fn calendar_ref(
        &self,
        side: &str,
        account: &Option<String>,
        calendar: &Option<String>,
    ) -> SyncResult<CalendarRef> {
        let account = account
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| SyncError::Config(format!("No {side} account configured")))?;

        let calendar = calendar
            .as_deref()
            .or(self.calendar.as_deref())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SyncError::Config(format!("No {side} calendar configured")))?;

        Ok(CalendarRef::new(account, calendar))
    }

    /// The overlap buffer, parsed from humantime syntax (`60s`, `1m`, `1m 30s`).
    pub fn buffer(&self) -> SyncResult<chrono::Duration> {
        let std_duration = humantime::parse_duration(&self.buffer)
            .map_err(|e| SyncError::Config(format!("Invalid buffer '{}': {}", self.buffer, e)))?;

        chrono::Duration::from_std(std_duration)
            .map_err(|_| SyncError::Config(format!("Buffer '{}' is too large", self.buffer)))
    }

    /// Configured timezone, else the system zone, else UTC.
    pub fn timezone(&self) -> SyncResult<Tz> {
        match &self.timezone {
            Some(name) => Tz::from_str(name)
                .map_err(|_| SyncError::Config(format!("Unknown timezone '{name}'"))),
            None => Ok(system_timezone()),
        }
    }

    pub fn window_days(&self) -> SyncResult<i64> {
        if self.window_days < 1 {
            return Err(SyncError::Config(format!(
                "window_days must be at least 1, got {}",
                self.window_days
            )));
        }
        Ok(self.window_days)
    }

    pub fn to_toml(&self) -> SyncResult<String> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }
}

fn system_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| Tz::from_str(&name).ok())
        .unwrap_or(Tz::UTC)
}
