//! The break scheduler.
//!
//! A state machine ticked once per second. While working, each tick credits
//! one second of active time if the user was seen recently and takes one
//! away otherwise; once the credited time reaches the work duration a break
//! starts. Breaks run on wall-clock time from the moment they start.
//!
//! ```text
//!            active_time >= work            break elapsed
//!  Working ───────────────────▶ Breaking ─────────────────▶ Paused
//!     ▲                                                        │
//!     └─────────────────────── toggle_pause ───────────────────┘
//! ```
//!
//! Pausing is orthogonal: it freezes whichever of Working or Breaking is
//! current and resuming returns to it. A finished break always lands in
//! Paused so the user has to acknowledge it before measurement resumes.

use crate::activity::SharedActivityMonitor;
use crate::config::{BreakSettings, ConfigError, DurationKind, EngineSettings};
use crate::hooks::{AlertHook, RewardHook};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Interval between scheduler ticks.
pub const TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// Active time credited (or decayed) per tick, in seconds.
const TICK_SECS: u64 = 1;

/// What the scheduler is doing, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Working,
    Breaking,
    Paused,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Working => "Working",
            Mode::Breaking => "On Break",
            Mode::Paused => "Paused",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The part of the cycle that pausing freezes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Working,
    Breaking,
}

/// A state change produced by a tick or an explicit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    BreakStarted,
    BreakEnded,
}

/// Read-only view of the scheduler for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub at: DateTime<Utc>,
    pub mode: Mode,
    /// True while a break is in progress, paused or not
    pub on_break: bool,
    /// Seconds credited toward the current work episode
    pub active_time: u64,
    /// Seconds left in the current work episode or break
    pub remaining_seconds: u64,
    pub progress_percent: f64,
    /// Seconds since the last honored activity signal
    pub idle_seconds: u64,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub work_minutes: u32,
    pub break_minutes: u32,
}

impl Status {
    /// `MM:SS` rendering of `remaining_seconds`.
    pub fn remaining_clock(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }

    /// Write the status as JSON, replacing `path` in one step so readers
    /// never see a partial file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }
}

/// Errors from explicit user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The action makes no sense in the current mode.
    NotApplicable { action: &'static str, mode: Mode },
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::NotApplicable { action, mode } => {
                write!(f, "Cannot {action} while {}", mode.label().to_lowercase())
            }
        }
    }
}

impl std::error::Error for ActionError {}

/// Work/break state machine.
pub struct BreakScheduler {
    monitor: SharedActivityMonitor,
    rewards: Arc<dyn RewardHook>,
    alerts: Arc<dyn AlertHook>,
    idle_threshold: Duration,
    snooze_duration: Duration,
    breaks: BreakSettings,
    phase: Phase,
    paused: bool,
    active_time: u64,
    break_start_time: Option<DateTime<Utc>>,
    snooze_until: Option<DateTime<Utc>>,
}

impl BreakScheduler {
    /// Create a scheduler in Working mode with no active time.
    ///
    /// The monitor's pause flag is cleared so both sides agree.
    pub fn new(
        settings: &EngineSettings,
        monitor: SharedActivityMonitor,
        rewards: Arc<dyn RewardHook>,
        alerts: Arc<dyn AlertHook>,
    ) -> Self {
        monitor.set_paused(false);
        Self {
            monitor,
            rewards,
            alerts,
            idle_threshold: to_chrono(settings.idle_threshold),
            snooze_duration: to_chrono(settings.snooze_duration),
            breaks: settings.breaks,
            phase: Phase::Working,
            paused: false,
            active_time: 0,
            break_start_time: None,
            snooze_until: None,
        }
    }

    /// Advance the state machine by one tick.
    pub fn tick(&mut self) -> Option<Transition> {
        let now = self.monitor.now();

        if self.paused {
            return None;
        }

        match self.phase {
            Phase::Working => self.tick_working(now),
            Phase::Breaking => self.tick_breaking(now),
        }
    }

    fn tick_working(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.is_snoozed(now) {
            return None;
        }

        let work_secs = self.breaks.work_secs();
        self.active_time = self.active_time.min(work_secs);

        if self.monitor.idle_for(now) < self.idle_threshold {
            self.active_time = (self.active_time + TICK_SECS).min(work_secs);
        } else {
            self.active_time = self.active_time.saturating_sub(TICK_SECS);
        }

        if self.active_time >= work_secs {
            self.trigger_break(now);
            return Some(Transition::BreakStarted);
        }
        None
    }

    fn tick_breaking(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.break_remaining_secs(now) == 0 {
            self.end_break(now);
            return Some(Transition::BreakEnded);
        }
        None
    }

    fn trigger_break(&mut self, now: DateTime<Utc>) {
        self.phase = Phase::Breaking;
        self.break_start_time = Some(now);
        self.active_time = 0;
        self.monitor.session_log().record_break_started();

        info!(
            "Break started ({} min after {} min of work)",
            self.breaks.break_minutes, self.breaks.work_minutes
        );

        self.rewards.on_points_earned(self.breaks.work_minutes);
        self.alerts.on_break_started();
    }

    fn end_break(&mut self, now: DateTime<Utc>) {
        self.rewards.on_break_completed();

        self.phase = Phase::Working;
        self.active_time = 0;
        self.monitor.reset_last_activity(now);
        self.paused = true;
        self.monitor.set_paused(true);
        self.monitor.session_log().record_break_completed();

        info!("Break ended; paused until resumed");

        self.alerts.on_break_ended();
    }

    /// Flip between paused and running.
    ///
    /// Timer fields are left untouched; the activity monitor stops or
    /// resumes honoring probe signals.
    pub fn toggle_pause(&mut self) -> Mode {
        self.paused = !self.paused;
        self.monitor.set_paused(self.paused);
        let mode = self.mode();
        info!("Timer {}", if self.paused { "paused" } else { "resumed" });
        mode
    }

    /// Pause or resume. Returns whether anything changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if self.paused == paused {
            return false;
        }
        self.toggle_pause();
        true
    }

    /// Hold the work timer and clear progress for the snooze duration.
    pub fn snooze(&mut self) -> DateTime<Utc> {
        let until = self
            .monitor
            .now()
            .checked_add_signed(self.snooze_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.snooze_until = Some(until);
        self.active_time = 0;
        self.monitor.session_log().record_snooze();
        info!("Snoozed until {}", until.format("%H:%M:%S"));
        until
    }

    /// Start a break right away.
    pub fn force_break(&mut self) -> Result<(), ActionError> {
        if self.mode() != Mode::Working {
            return Err(ActionError::NotApplicable {
                action: "start a break",
                mode: self.mode(),
            });
        }
        let now = self.monitor.now();
        self.trigger_break(now);
        Ok(())
    }

    /// End the current break before it runs out.
    pub fn end_break_now(&mut self) -> Result<(), ActionError> {
        if self.phase != Phase::Breaking {
            return Err(ActionError::NotApplicable {
                action: "end a break",
                mode: self.mode(),
            });
        }
        let now = self.monitor.now();
        self.end_break(now);
        Ok(())
    }

    /// Change the work duration. See [`BreakScheduler::apply_settings`].
    pub fn set_work_duration(&mut self, minutes: u32) -> Result<bool, ConfigError> {
        let minutes = DurationKind::Work.validate(minutes)?;
        self.apply_settings(BreakSettings {
            work_minutes: minutes,
            ..self.breaks
        })
    }

    /// Change the break duration. See [`BreakScheduler::apply_settings`].
    pub fn set_break_duration(&mut self, minutes: u32) -> Result<bool, ConfigError> {
        let minutes = DurationKind::Break.validate(minutes)?;
        self.apply_settings(BreakSettings {
            break_minutes: minutes,
            ..self.breaks
        })
    }

    /// Replace both durations.
    ///
    /// Invalid values are rejected without touching any state. Identical
    /// values are a no-op. Otherwise a work episode restarts from zero, or a
    /// break restarts its clock under the new length. Returns whether a
    /// reset happened.
    pub fn apply_settings(&mut self, settings: BreakSettings) -> Result<bool, ConfigError> {
        settings.validate()?;
        if settings == self.breaks {
            debug!("Settings unchanged");
            return Ok(false);
        }

        let now = self.monitor.now();
        self.breaks = settings;
        match self.phase {
            Phase::Working => {
                self.active_time = 0;
                self.monitor.reset_last_activity(now);
            }
            Phase::Breaking => {
                self.break_start_time = Some(now);
            }
        }

        info!(
            "Settings updated: work {} min, break {} min; timer reset",
            settings.work_minutes, settings.break_minutes
        );
        Ok(true)
    }

    pub fn mode(&self) -> Mode {
        match (self.paused, self.phase) {
            (true, _) => Mode::Paused,
            (false, Phase::Working) => Mode::Working,
            (false, Phase::Breaking) => Mode::Breaking,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_on_break(&self) -> bool {
        self.phase == Phase::Breaking
    }

    pub fn active_time(&self) -> u64 {
        self.active_time
    }

    pub fn break_start_time(&self) -> Option<DateTime<Utc>> {
        self.break_start_time
    }

    pub fn snooze_until(&self) -> Option<DateTime<Utc>> {
        self.snooze_until
    }

    pub fn settings(&self) -> BreakSettings {
        self.breaks
    }

    pub fn monitor(&self) -> &SharedActivityMonitor {
        &self.monitor
    }

    fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snooze_until.is_some_and(|until| now < until)
    }

    fn break_elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.break_start_time
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    fn break_remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.breaks
            .break_secs()
            .saturating_sub(self.break_elapsed_secs(now))
    }

    /// Derived values for display at the current time.
    pub fn status(&self) -> Status {
        let now = self.monitor.now();
        let (remaining_seconds, progress_percent) = match self.phase {
            Phase::Working => {
                let work_secs = self.breaks.work_secs();
                let active = self.active_time.min(work_secs);
                (work_secs - active, percent(active, work_secs))
            }
            Phase::Breaking => (
                self.break_remaining_secs(now),
                percent(self.break_elapsed_secs(now), self.breaks.break_secs()),
            ),
        };

        Status {
            at: now,
            mode: self.mode(),
            on_break: self.is_on_break(),
            active_time: self.active_time,
            remaining_seconds,
            progress_percent,
            idle_seconds: self.monitor.idle_for(now).num_seconds().max(0) as u64,
            snoozed_until: self.snooze_until.filter(|until| now < *until),
            work_minutes: self.breaks.work_minutes,
            break_minutes: self.breaks.break_minutes,
        }
    }
}

impl fmt::Debug for BreakScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakScheduler")
            .field("mode", &self.mode())
            .field("active_time", &self.active_time)
            .field("break_start_time", &self.break_start_time)
            .field("snooze_until", &self.snooze_until)
            .field("breaks", &self.breaks)
            .finish()
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 100.0;
    }
    (part as f64 / whole as f64).min(1.0) * 100.0
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}
