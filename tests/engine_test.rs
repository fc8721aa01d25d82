//! End-to-end tests driving the engine with a manual clock.

use restwatch::{
    AlertHook, BreakSettings, Clock, Engine, EngineSettings, ManualClock, Mode,
    PersistentRewards, RewardHook, RewardLedger, SignalSource, Transition,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CountingRewards {
    points: Mutex<Vec<u32>>,
    breaks_completed: AtomicU32,
}

impl RewardHook for CountingRewards {
    fn on_points_earned(&self, minutes: u32) {
        self.points.lock().unwrap().push(minutes);
    }

    fn on_break_completed(&self) {
        self.breaks_completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CountingAlerts {
    started: AtomicU32,
    ended: AtomicU32,
}

impl AlertHook for CountingAlerts {
    fn on_break_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_break_ended(&self) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    rewards: Arc<CountingRewards>,
    alerts: Arc<CountingAlerts>,
    engine: Engine,
}

impl Harness {
    fn new(work_minutes: u32, break_minutes: u32) -> Self {
        let clock = Arc::new(ManualClock::at_epoch());
        let rewards = Arc::new(CountingRewards::default());
        let alerts = Arc::new(CountingAlerts::default());
        let settings = EngineSettings {
            breaks: BreakSettings::new(work_minutes, break_minutes).unwrap(),
            ..EngineSettings::default()
        };
        let engine = Engine::new(settings, clock.clone(), rewards.clone(), alerts.clone());

        Self {
            clock,
            rewards,
            alerts,
            engine,
        }
    }

    /// One second passes, the input probe optionally fires, then a tick.
    fn tick(&mut self, active: bool) -> Option<Transition> {
        self.clock.advance_secs(1);
        if active {
            self.engine.monitor().report_activity(SignalSource::Input);
        }
        self.engine.step().1
    }
}

#[test]
fn test_continuous_activity_triggers_break_at_work_duration() {
    let mut h = Harness::new(25, 5);

    for tick in 1..1500 {
        assert_eq!(h.tick(true), None, "no transition expected at tick {tick}");
        assert_eq!(h.engine.scheduler().mode(), Mode::Working);
    }
    assert_eq!(h.tick(true), Some(Transition::BreakStarted));
    assert_eq!(h.engine.scheduler().mode(), Mode::Breaking);

    assert_eq!(*h.rewards.points.lock().unwrap(), vec![25]);
    assert_eq!(h.alerts.started.load(Ordering::SeqCst), 1);

    // Activity during the break does not re-trigger anything
    for _ in 0..10 {
        assert_eq!(h.tick(true), None);
    }
    assert_eq!(h.rewards.points.lock().unwrap().len(), 1);
    assert_eq!(h.alerts.started.load(Ordering::SeqCst), 1);
}

#[test]
fn test_idle_decay_reaches_zero_and_stays() {
    let mut h = Harness::new(25, 5);
    for _ in 0..10 {
        h.tick(true);
    }
    assert_eq!(h.engine.scheduler().active_time(), 10);

    // Last activity well beyond the idle threshold
    let long_ago = h.clock.now() - chrono::Duration::seconds(60);
    h.engine.monitor().reset_last_activity(long_ago);

    let mut previous = 10;
    for _ in 0..10 {
        h.tick(false);
        let active = h.engine.scheduler().active_time();
        assert!(active < previous);
        previous = active;
    }
    assert_eq!(h.engine.scheduler().active_time(), 0);

    for _ in 0..30 {
        h.tick(false);
        assert_eq!(h.engine.scheduler().active_time(), 0);
    }
}

#[test]
fn test_break_ends_once_and_waits_for_resume() {
    let mut h = Harness::new(15, 5);
    h.engine.scheduler_mut().force_break().unwrap();
    assert_eq!(h.alerts.started.load(Ordering::SeqCst), 1);

    for _ in 0..299 {
        assert_eq!(h.tick(false), None);
    }
    assert_eq!(h.tick(false), Some(Transition::BreakEnded));
    assert_eq!(h.engine.scheduler().mode(), Mode::Paused);
    assert_eq!(h.alerts.ended.load(Ordering::SeqCst), 1);
    assert_eq!(h.rewards.breaks_completed.load(Ordering::SeqCst), 1);

    // Nothing moves until the user resumes
    for _ in 0..100 {
        assert_eq!(h.tick(true), None);
    }
    assert_eq!(h.engine.scheduler().mode(), Mode::Paused);
    assert_eq!(h.engine.scheduler().active_time(), 0);
    assert_eq!(h.alerts.ended.load(Ordering::SeqCst), 1);

    h.engine.scheduler_mut().toggle_pause();
    assert_eq!(h.engine.scheduler().mode(), Mode::Working);
    h.tick(true);
    assert_eq!(h.engine.scheduler().active_time(), 1);
}

#[test]
fn test_natural_break_ends_once_after_break_duration() {
    let mut h = Harness::new(15, 5);

    for _ in 0..(15 * 60 - 1) {
        assert_eq!(h.tick(true), None);
    }
    assert_eq!(h.tick(true), Some(Transition::BreakStarted));
    assert_eq!(h.engine.scheduler().mode(), Mode::Breaking);
    assert_eq!(*h.rewards.points.lock().unwrap(), vec![15]);

    for _ in 0..299 {
        assert_eq!(h.tick(false), None);
    }
    assert_eq!(h.tick(false), Some(Transition::BreakEnded));
    assert_eq!(h.engine.scheduler().mode(), Mode::Paused);

    for _ in 0..60 {
        assert_eq!(h.tick(true), None);
    }
    assert_eq!(h.alerts.started.load(Ordering::SeqCst), 1);
    assert_eq!(h.alerts.ended.load(Ordering::SeqCst), 1);
    assert_eq!(h.rewards.breaks_completed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_signals_while_paused_are_ignored() {
    let mut h = Harness::new(25, 5);
    h.tick(true);
    h.engine.scheduler_mut().toggle_pause();

    let before = h.engine.monitor().last_activity_time();
    for _ in 0..5 {
        h.tick(true);
    }
    assert_eq!(h.engine.monitor().last_activity_time(), before);

    let stats = h.engine.session_log().stats();
    assert_eq!(stats.input_signals, 1);
    assert_eq!(stats.ignored_signals, 5);
}

#[test]
fn test_repeated_settings_write_resets_once() {
    let mut h = Harness::new(25, 5);
    for _ in 0..30 {
        h.tick(true);
    }

    let settings = BreakSettings::new(45, 10).unwrap();
    assert_eq!(h.engine.scheduler_mut().apply_settings(settings), Ok(true));
    assert_eq!(h.engine.scheduler().active_time(), 0);

    for _ in 0..7 {
        h.tick(true);
    }
    assert_eq!(h.engine.scheduler_mut().apply_settings(settings), Ok(false));
    assert_eq!(h.engine.scheduler().active_time(), 7);
    assert_eq!(h.engine.scheduler().status().remaining_seconds, 45 * 60 - 7);
}

#[test]
fn test_shrinking_work_duration_never_goes_negative() {
    let mut h = Harness::new(30, 5);
    for _ in 0..20 * 60 {
        h.tick(true);
    }

    h.engine.scheduler_mut().set_work_duration(15).unwrap();
    let status = h.engine.scheduler().status();
    assert_eq!(status.active_time, 0);
    assert_eq!(status.remaining_seconds, 15 * 60);
    assert!(status.progress_percent <= 100.0);
}

#[test]
fn test_full_cycle_updates_persistent_rewards() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rewards.json");
    let clock = Arc::new(ManualClock::at_epoch());
    let rewards = Arc::new(PersistentRewards::open(&path, clock.clone()));
    let settings = EngineSettings {
        breaks: BreakSettings::new(15, 1).unwrap(),
        ..EngineSettings::default()
    };
    let mut engine = Engine::new(
        settings,
        clock.clone(),
        rewards.clone(),
        Arc::new(restwatch::NoopHooks),
    );

    let mut transitions = Vec::new();
    for _ in 0..(15 * 60 + 60) {
        clock.advance_secs(1);
        engine.monitor().report_activity(SignalSource::Window);
        if let (_, Some(transition)) = engine.step() {
            transitions.push(transition);
        }
    }

    assert_eq!(
        transitions,
        vec![Transition::BreakStarted, Transition::BreakEnded]
    );
    rewards.flush();
    let ledger = RewardLedger::load(&path).unwrap();
    assert_eq!(ledger.points, 15);
    assert_eq!(ledger.daily_breaks, 1);
    assert_eq!(ledger.current_streak, 1);

    let stats = engine.session_log().stats();
    assert_eq!(stats.breaks_started, 1);
    assert_eq!(stats.breaks_completed, 1);
}
