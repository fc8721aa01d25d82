//! The activity aggregator.
//!
//! All probes fan in to a single [`ActivityMonitor`] that keeps nothing but
//! the time of the most recent honored signal and a pause flag. The
//! scheduler only ever needs "how long since the user last did something",
//! so the signals themselves are never retained.

use crate::clock::{millis_to_datetime, SharedClock};
use crate::transparency::SharedSessionLog;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Which probe produced an activity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Keyboard or pointer event
    Input,
    /// Foreground window changed
    Window,
    /// Screen content changed substantially
    Screen,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Input => "input",
            SignalSource::Window => "window",
            SignalSource::Screen => "screen",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared last-activity cell.
///
/// The timestamp is stored as epoch milliseconds in an atomic so readers
/// always observe a fully written value. Probe reports only ever move it
/// forward; the scheduler is the only caller allowed to reset it.
pub struct ActivityMonitor {
    clock: SharedClock,
    last_activity_ms: AtomicI64,
    paused: AtomicBool,
    log: SharedSessionLog,
}

/// Handle held by every probe and by the scheduler.
pub type SharedActivityMonitor = Arc<ActivityMonitor>;

impl ActivityMonitor {
    /// Create an aggregator whose last activity is "now".
    pub fn new(clock: SharedClock, log: SharedSessionLog) -> Self {
        let now = clock.now().timestamp_millis();
        Self {
            clock,
            last_activity_ms: AtomicI64::new(now),
            paused: AtomicBool::new(false),
            log,
        }
    }

    /// Create a shared aggregator.
    pub fn shared(clock: SharedClock, log: SharedSessionLog) -> SharedActivityMonitor {
        Arc::new(Self::new(clock, log))
    }

    /// Record that the user did something.
    ///
    /// Returns `false` if the signal was ignored because the monitor is paused.
    pub fn report_activity(&self, source: SignalSource) -> bool {
        if self.paused.load(Ordering::SeqCst) {
            self.log.record_ignored_signal();
            return false;
        }

        let now = self.clock.now().timestamp_millis();
        self.last_activity_ms.fetch_max(now, Ordering::SeqCst);
        self.log.record_signal(source);
        true
    }

    /// Time of the most recent honored signal (or the last scheduler reset).
    pub fn last_activity_time(&self) -> DateTime<Utc> {
        millis_to_datetime(self.last_activity_ms.load(Ordering::SeqCst))
    }

    /// How long the user has been idle as of `now`. Never negative.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity_time()).max(Duration::zero())
    }

    /// Toggle whether incoming signals are honored. Does not touch the timestamp.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Overwrite the last-activity timestamp, even backwards.
    ///
    /// Used by the scheduler when a break ends or the work episode restarts.
    pub fn reset_last_activity(&self, at: DateTime<Utc>) {
        self.last_activity_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// The clock all engine components share.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn session_log(&self) -> &SharedSessionLog {
        &self.log
    }
}

impl fmt::Debug for ActivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityMonitor")
            .field("last_activity_time", &self.last_activity_time())
            .field("paused", &self.is_paused())
            .finish()
    }
}
