//! Per-session activity log.
//!
//! Counts signals and break-cycle events without storing any content.
//! Counters are atomics so probes and the scheduler can record from their
//! own threads without coordination.

use crate::activity::SignalSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session counters.
#[derive(Debug)]
pub struct SessionLog {
    /// Honored signals from the input probe
    input_signals: AtomicU64,
    /// Honored signals from the foreground-window probe
    window_signals: AtomicU64,
    /// Honored signals from the screen-sampling probe
    screen_signals: AtomicU64,
    /// Signals dropped because the engine was paused
    ignored_signals: AtomicU64,
    /// Breaks entered
    breaks_started: AtomicU64,
    /// Breaks that ran to completion (or were ended manually)
    breaks_completed: AtomicU64,
    /// Snooze requests
    snoozes: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl SessionLog {
    /// Create a new session log.
    pub fn new() -> Self {
        Self {
            input_signals: AtomicU64::new(0),
            window_signals: AtomicU64::new(0),
            screen_signals: AtomicU64::new(0),
            ignored_signals: AtomicU64::new(0),
            breaks_started: AtomicU64::new(0),
            breaks_completed: AtomicU64::new(0),
            snoozes: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    /// Record a signal that updated the last-activity timestamp.
    pub fn record_signal(&self, source: SignalSource) {
        let counter = match source {
            SignalSource::Input => &self.input_signals,
            SignalSource::Window => &self.window_signals,
            SignalSource::Screen => &self.screen_signals,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a signal that arrived while paused.
    pub fn record_ignored_signal(&self) {
        self.ignored_signals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_break_started(&self) {
        self.breaks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_break_completed(&self) {
        self.breaks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snooze(&self) {
        self.snoozes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            input_signals: self.input_signals.load(Ordering::Relaxed),
            window_signals: self.window_signals.load(Ordering::Relaxed),
            screen_signals: self.screen_signals.load(Ordering::Relaxed),
            ignored_signals: self.ignored_signals.load(Ordering::Relaxed),
            breaks_started: self.breaks_started.load(Ordering::Relaxed),
            breaks_completed: self.breaks_completed.load(Ordering::Relaxed),
            snoozes: self.snoozes.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Input signals: {}\n\
             - Window-change signals: {}\n\
             - Screen-change signals: {}\n\
             - Signals ignored while paused: {}\n\
             - Breaks started: {}\n\
             - Breaks completed: {}\n\
             - Snoozes: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No key content captured\n\
             - No cursor coordinates captured\n\
             - No screen images stored",
            stats.input_signals,
            stats.window_signals,
            stats.screen_signals,
            stats.ignored_signals,
            stats.breaks_started,
            stats.breaks_completed,
            stats.snoozes,
            stats.session_duration_secs
        )
    }

    /// Write the current stats as JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.stats())?;
        std::fs::write(path, json)
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of session statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub input_signals: u64,
    pub window_signals: u64,
    pub screen_signals: u64,
    pub ignored_signals: u64,
    pub breaks_started: u64,
    pub breaks_completed: u64,
    pub snoozes: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl SessionStats {
    /// Total honored signals across all probes.
    pub fn total_signals(&self) -> u64 {
        self.input_signals + self.window_signals + self.screen_signals
    }
}

/// Thread-safe shared session log.
pub type SharedSessionLog = Arc<SessionLog>;
