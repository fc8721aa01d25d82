//! One-shot requests from the CLI to a running engine.
//!
//! `restwatch snooze`, `break` and `end-break` drop a small JSON file in the
//! data directory; the engine picks it up on its next poll, deletes it and
//! applies it. Only the latest request is kept.

use crate::scheduler::{ActionError, BreakScheduler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRequest {
    Snooze,
    ForceBreak,
    EndBreak,
}

impl ControlRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlRequest::Snooze => "snooze",
            ControlRequest::ForceBreak => "break",
            ControlRequest::EndBreak => "end-break",
        }
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub request: ControlRequest,
    pub issued_at: DateTime<Utc>,
}

impl ControlMessage {
    pub fn new(request: ControlRequest, issued_at: DateTime<Utc>) -> Self {
        Self { request, issued_at }
    }

    /// Issued before the engine started, so meant for an earlier run.
    pub fn is_stale(&self, started_at: DateTime<Utc>) -> bool {
        self.issued_at < started_at
    }
}

#[derive(Debug)]
pub enum ControlError {
    Io(std::io::Error),
    Parse(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Io(e) => write!(f, "Control file error: {e}"),
            ControlError::Parse(e) => write!(f, "Malformed control request: {e}"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<std::io::Error> for ControlError {
    fn from(e: std::io::Error) -> Self {
        ControlError::Io(e)
    }
}

/// Write `message`, replacing any request not yet consumed.
pub fn write_request(path: &Path, message: &ControlMessage) -> Result<(), ControlError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(message).map_err(|e| ControlError::Parse(e.to_string()))?;

    // Write then rename so the engine never reads a partial file
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Take the pending request, if any, removing the file.
///
/// A malformed file is removed too, so it is reported only once.
pub fn take_request(path: &Path) -> Result<Option<ControlMessage>, ControlError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    std::fs::remove_file(path)?;

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ControlError::Parse(e.to_string()))
}

/// Run the scheduler action behind `request`.
pub fn apply(scheduler: &mut BreakScheduler, request: ControlRequest) -> Result<(), ActionError> {
    info!("Applying {request} request");
    match request {
        ControlRequest::Snooze => {
            scheduler.snooze();
            Ok(())
        }
        ControlRequest::ForceBreak => scheduler.force_break(),
        ControlRequest::EndBreak => scheduler.end_break_now(),
    }
}
