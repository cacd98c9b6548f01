//! Provider subprocess backend.
//!
//! Talks to an external provider binary (e.g. `busyblock-provider-outlook`)
//! using JSON over stdin/stdout. Any executable that speaks the protocol can
//! be a provider; it owns its credentials and session handling.

pub mod protocol;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::event::{BusyBlock, Event, NewBusyBlock};
use crate::provider::{CalendarHandle, CalendarProvider, IntervalFilter};
use protocol::{
    Command, CreateEntry, ProviderCommand, QueryEvents, Request, ResolveCalendar, Response,
};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct SubprocessProvider {
    name: String,
}

impl SubprocessProvider {
    pub fn from_name(name: &str) -> Self {
        SubprocessProvider {
            name: name.to_string(),
        }
    }

    pub fn binary_name(&self) -> String {
        format!("busyblock-provider-{}", self.name)
    }

    fn binary_path(&self) -> SyncResult<PathBuf> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| SyncError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return the result.
    ///
    /// The response type is inferred from the command's associated type.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> SyncResult<C::Response> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| SyncError::ProviderTimeout(PROVIDER_TIMEOUT.as_secs()))?
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> SyncResult<R> {
        let request_json = encode_request(command, params)?;
        let binary_path = self.binary_path()?;
        debug!(provider = %self.name, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SyncError::Provider(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SyncError::Provider("Provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(SyncError::Provider(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        decode_response(&output.stdout)
    }
}

fn encode_request<P: Serialize>(command: Command, params: P) -> SyncResult<String> {
    let params =
        serde_json::to_value(params).map_err(|e| SyncError::Serialization(e.to_string()))?;
    serde_json::to_string(&Request { command, params })
        .map_err(|e| SyncError::Serialization(e.to_string()))
}

fn decode_response<R: DeserializeOwned>(stdout: &[u8]) -> SyncResult<R> {
    let response_str = String::from_utf8_lossy(stdout);
    if response_str.trim().is_empty() {
        return Err(SyncError::Provider("Provider returned no response".into()));
    }

    let response: Response<R> = serde_json::from_str(&response_str)
        .map_err(|e| SyncError::Provider(format!("Failed to parse response: {}", e)))?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(SyncError::Provider(error)),
    }
}

#[async_trait]
impl CalendarProvider for SubprocessProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_calendar(
        &self,
        account: &str,
        calendar: &str,
    ) -> SyncResult<CalendarHandle> {
        self.call(ResolveCalendar {
            account: account.to_string(),
            calendar: calendar.to_string(),
        })
        .await?
        .ok_or_else(|| SyncError::CalendarNotFound {
            account: account.to_string(),
            calendar: calendar.to_string(),
        })
    }

    async fn query_events(
        &self,
        calendar: &CalendarHandle,
        filter: &IntervalFilter,
        expand_recurrences: bool,
    ) -> SyncResult<Vec<Event>> {
        self.call(QueryEvents {
            calendar: calendar.clone(),
            filter: *filter,
            expand_recurrences,
        })
        .await
        .map_err(|e| SyncError::ProviderQuery(e.to_string()))
    }

    async fn create_entry(
        &self,
        calendar: &CalendarHandle,
        block: &NewBusyBlock,
    ) -> SyncResult<BusyBlock> {
        self.call(CreateEntry {
            calendar: calendar.clone(),
            block: block.clone(),
        })
        .await
        .map_err(|e| SyncError::Write(e.to_string()))
    }
}
