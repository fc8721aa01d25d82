//! Points, streaks and weekly challenges for completed work and breaks.
//!
//! The ledger is a small JSON document in the data directory. It is the
//! only state that outlives a run; timer state never does.

use crate::clock::SharedClock;
use crate::hooks::RewardHook;
use chrono::{Local, NaiveDate};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Target for the weekly points challenge.
pub const WEEKLY_POINTS_TARGET: u32 = 500;
/// Target for the weekly breaks challenge.
pub const WEEKLY_BREAKS_TARGET: u32 = 10;
/// Bonus for finishing the weekly points challenge.
pub const WEEKLY_POINTS_BONUS: u32 = 100;
/// Bonus for finishing the weekly breaks challenge.
pub const WEEKLY_BREAKS_BONUS: u32 = 50;

/// Days between challenge resets.
const CHALLENGE_PERIOD_DAYS: i64 = 7;

/// Longest `flush` waits for the writer thread.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub target: u32,
    pub progress: u32,
    pub completed: bool,
}

impl Challenge {
    pub fn new(target: u32) -> Self {
        Self {
            target,
            progress: 0,
            completed: false,
        }
    }

    /// Add progress. Returns true if this completed the challenge.
    fn advance(&mut self, amount: u32) -> bool {
        if self.completed {
            return false;
        }
        self.progress = self.progress.saturating_add(amount);
        if self.progress >= self.target {
            self.completed = true;
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.progress = 0;
        self.completed = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenges {
    pub weekly_points: Challenge,
    pub weekly_breaks: Challenge,
}

impl Default for Challenges {
    fn default() -> Self {
        Self {
            weekly_points: Challenge::new(WEEKLY_POINTS_TARGET),
            weekly_breaks: Challenge::new(WEEKLY_BREAKS_TARGET),
        }
    }
}

/// Accumulated rewards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardLedger {
    pub points: u32,
    /// Breaks taken on `last_break_date`
    pub daily_breaks: u32,
    /// Consecutive days with at least one break
    pub current_streak: u32,
    pub last_break_date: Option<NaiveDate>,
    pub challenges: Challenges,
    /// Day the weekly challenges were last cleared
    pub last_reset: Option<NaiveDate>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit points for a finished work episode.
    pub fn add_points(&mut self, points: u32, today: NaiveDate) {
        self.check_weekly_reset(today);
        self.points = self.points.saturating_add(points);

        if self.challenges.weekly_points.advance(points) {
            info!("Weekly points challenge completed (+{WEEKLY_POINTS_BONUS} bonus)");
            self.points = self.points.saturating_add(WEEKLY_POINTS_BONUS);
        }
    }

    /// Count a finished break toward the daily tally, streak and challenge.
    pub fn record_break(&mut self, today: NaiveDate) {
        self.check_weekly_reset(today);

        if self.last_break_date == Some(today) {
            self.daily_breaks += 1;
        } else {
            let consecutive = self
                .last_break_date
                .is_some_and(|last| (today - last).num_days() == 1);
            self.current_streak = if consecutive {
                self.current_streak + 1
            } else {
                1
            };
            self.daily_breaks = 1;
            self.last_break_date = Some(today);
        }

        if self.challenges.weekly_breaks.advance(1) {
            info!("Weekly breaks challenge completed (+{WEEKLY_BREAKS_BONUS} bonus)");
            self.points = self.points.saturating_add(WEEKLY_BREAKS_BONUS);
        }
    }

    /// Clear challenge progress once a week. Returns whether a reset happened.
    pub fn check_weekly_reset(&mut self, today: NaiveDate) -> bool {
        let due = match self.last_reset {
            None => true,
            Some(last) => (today - last).num_days() >= CHALLENGE_PERIOD_DAYS,
        };
        if due {
            self.challenges.weekly_points.reset();
            self.challenges.weekly_breaks.reset();
            self.last_reset = Some(today);
        }
        due
    }

    /// Load a ledger. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, RewardError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| RewardError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| RewardError::Parse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), RewardError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RewardError::Io(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| RewardError::Parse(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| RewardError::Io(e.to_string()))
    }

    /// Multi-line summary for the CLI.
    pub fn summary(&self) -> String {
        let points = &self.challenges.weekly_points;
        let breaks = &self.challenges.weekly_breaks;
        format!(
            "Rewards\n\
             =======\n\
             Total points: {}\n\
             Current streak: {} day{}\n\
             Breaks today: {}\n\
             \n\
             Weekly challenges:\n\
             - Earn {} points: {}/{}{}\n\
             - Take {} breaks: {}/{}{}",
            self.points,
            self.current_streak,
            if self.current_streak == 1 { "" } else { "s" },
            self.daily_breaks,
            points.target,
            points.progress.min(points.target),
            points.target,
            if points.completed { " (done)" } else { "" },
            breaks.target,
            breaks.progress.min(breaks.target),
            breaks.target,
            if breaks.completed { " (done)" } else { "" },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    Io(String),
    Parse(String),
}

impl fmt::Display for RewardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardError::Io(e) => write!(f, "Rewards file error: {e}"),
            RewardError::Parse(e) => write!(f, "Rewards data error: {e}"),
        }
    }
}

impl std::error::Error for RewardError {}

enum SaveRequest {
    Save(RewardLedger),
    Flush(Sender<()>),
}

/// A reward hook backed by a ledger file, saved after every change.
///
/// Saves happen on a writer thread so the scheduler tick never waits on
/// disk. Dropping the hook writes out anything still queued.
pub struct PersistentRewards {
    path: PathBuf,
    clock: SharedClock,
    ledger: Mutex<RewardLedger>,
    saver: Option<Sender<SaveRequest>>,
    writer: Option<JoinHandle<()>>,
}

impl PersistentRewards {
    /// Load the ledger at `path`. A missing or unreadable file starts a
    /// fresh ledger, which is written out immediately.
    pub fn open(path: impl Into<PathBuf>, clock: SharedClock) -> Self {
        let path = path.into();
        let mut ledger = match RewardLedger::load(&path) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Starting a new rewards ledger: {e}");
                RewardLedger::new()
            }
        };

        let today = local_date(&clock);
        ledger.check_weekly_reset(today);
        save_logged(&ledger, &path);

        let (saver, requests) = crossbeam_channel::unbounded();
        let writer_path = path.clone();
        let (saver, writer) = match thread::Builder::new()
            .name("restwatch-rewards".to_string())
            .spawn(move || run_writer(&writer_path, requests))
        {
            Ok(handle) => (Some(saver), Some(handle)),
            Err(e) => {
                warn!("Saving rewards inline, writer thread failed to start: {e}");
                (None, None)
            }
        };

        Self {
            path,
            clock,
            ledger: Mutex::new(ledger),
            saver,
            writer,
        }
    }

    /// A copy of the current ledger.
    pub fn snapshot(&self) -> RewardLedger {
        match self.ledger.lock() {
            Ok(ledger) => ledger.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until every save queued so far is on disk.
    pub fn flush(&self) {
        let Some(saver) = &self.saver else {
            return;
        };
        let (done, wait) = crossbeam_channel::bounded(1);
        if saver.send(SaveRequest::Flush(done)).is_err() {
            return;
        }
        if wait.recv_timeout(FLUSH_TIMEOUT).is_err() {
            warn!("Timed out waiting for rewards to be saved");
        }
    }

    fn update(&self, apply: impl FnOnce(&mut RewardLedger)) {
        let mut ledger = match self.ledger.lock() {
            Ok(ledger) => ledger,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut ledger);

        // Queued under the lock so saves land in order
        let queued = match &self.saver {
            Some(saver) => saver.send(SaveRequest::Save(ledger.clone())).is_ok(),
            None => false,
        };
        if !queued {
            save_logged(&ledger, &self.path);
        }
    }
}

impl Drop for PersistentRewards {
    fn drop(&mut self) {
        drop(self.saver.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("Rewards writer thread panicked");
            }
        }
    }
}

fn run_writer(path: &Path, requests: Receiver<SaveRequest>) {
    for request in requests.iter() {
        match request {
            SaveRequest::Save(ledger) => save_logged(&ledger, path),
            SaveRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Rewards writer stopped");
}

fn save_logged(ledger: &RewardLedger, path: &Path) {
    if let Err(e) = ledger.save(path) {
        warn!("Could not save rewards: {e}");
    }
}

impl RewardHook for PersistentRewards {
    fn on_points_earned(&self, minutes: u32) {
        let today = local_date(&self.clock);
        self.update(|ledger| ledger.add_points(minutes, today));
    }

    fn on_break_completed(&self) {
        let today = local_date(&self.clock);
        self.update(|ledger| ledger.record_break(today));
    }
}

fn local_date(clock: &SharedClock) -> NaiveDate {
    clock.now().with_timezone(&Local).date_naive()
}
