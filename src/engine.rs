//! Wiring of the monitor, probes and scheduler.
//!
//! ```text
//!  ┌─────────┐  ┌─────────┐  ┌─────────┐
//!  │  input  │  │ window  │  │ screen  │   one thread each
//!  └────┬────┘  └────┬────┘  └────┬────┘
//!       └────────────┼────────────┘
//!                    ▼
//!           ┌─────────────────┐
//!           │ ActivityMonitor │   last activity + pause flag
//!           └────────┬────────┘
//!                    ▼
//!           ┌─────────────────┐
//!           │ BreakScheduler  │   ticked once per second
//!           └────────┬────────┘
//!                    ▼
//!          reward / alert hooks
//! ```

use crate::activity::{ActivityMonitor, SharedActivityMonitor};
use crate::clock::SharedClock;
use crate::config::{EngineSettings, ProbeConfig};
use crate::hooks::{AlertHook, RewardHook};
use crate::platform::{self, InputHook, SystemFrameSource, SystemWindowSource};
use crate::probe::{
    FrameSource, InputProbe, ProbeError, ProbeHandle, ProbeSet, ScreenProbe, WindowProbe,
    WindowSource, STOP_CHECK_INTERVAL,
};
use crate::scheduler::{BreakScheduler, Status, Transition, TICK};
use crate::transparency::{SessionLog, SharedSessionLog};
use chrono::{DateTime, Utc};
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Engine {
    settings: EngineSettings,
    monitor: SharedActivityMonitor,
    scheduler: BreakScheduler,
    probes: ProbeSet,
    started_at: DateTime<Utc>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        clock: SharedClock,
        rewards: Arc<dyn RewardHook>,
        alerts: Arc<dyn AlertHook>,
    ) -> Self {
        let started_at = clock.now();
        let log: SharedSessionLog = Arc::new(SessionLog::new());
        let monitor = ActivityMonitor::shared(clock, log);
        let scheduler = BreakScheduler::new(&settings, monitor.clone(), rewards, alerts);

        Self {
            settings,
            monitor,
            scheduler,
            probes: ProbeSet::new(),
            started_at,
        }
    }

    /// Start the OS-backed probes that are both requested and available on
    /// this platform. Returns the set that actually started.
    ///
    /// A probe that fails to start is logged and skipped; the others still run.
    pub fn start_probes(&mut self, requested: ProbeConfig) -> ProbeConfig {
        let available = platform::capabilities();
        let mut started = ProbeConfig {
            input: false,
            window: false,
            screen: false,
        };

        if requested.input {
            if !available.input {
                warn!("Input probe is not supported on this platform");
            } else if !platform::check_permission() {
                warn!("Input probe disabled: input monitoring permission not granted");
            } else {
                let result = InputProbe::spawn_with_hook(InputHook::new(), self.monitor.clone());
                started.input = self.track("input", result).is_ok();
            }
        }

        if requested.window {
            if available.window {
                started.window = self.start_window_probe(SystemWindowSource).is_ok();
            } else {
                warn!("Window probe is not supported on this platform");
            }
        }

        if requested.screen {
            if available.screen {
                started.screen = self.start_screen_probe(SystemFrameSource).is_ok();
            } else {
                warn!("Screen probe is not supported on this platform");
            }
        }

        if !started.any_enabled() {
            warn!("No probes running; only explicit actions will move the timer");
        }
        started
    }

    /// Start a window probe polling `source`.
    pub fn start_window_probe<S: WindowSource + 'static>(
        &mut self,
        source: S,
    ) -> Result<(), ProbeError> {
        let probe = WindowProbe::new(source, self.monitor.clone());
        let result = probe.spawn(self.settings.window_poll_interval);
        self.track("window", result)
    }

    /// Start a screen probe sampling `source`.
    pub fn start_screen_probe<S: FrameSource + 'static>(
        &mut self,
        source: S,
    ) -> Result<(), ProbeError> {
        let probe = ScreenProbe::new(
            source,
            self.monitor.clone(),
            self.settings.screen_change_threshold,
        );
        let result = probe.spawn(self.settings.screen_check_interval);
        self.track("screen", result)
    }

    fn track(
        &mut self,
        name: &str,
        result: Result<ProbeHandle, ProbeError>,
    ) -> Result<(), ProbeError> {
        match result {
            Ok(handle) => {
                info!("{name} probe running");
                self.probes.push(handle);
                Ok(())
            }
            Err(e) => {
                warn!("Could not start {name} probe: {e}");
                Err(e)
            }
        }
    }

    /// Tick the scheduler once and return what changed.
    pub fn step(&mut self) -> (Status, Option<Transition>) {
        let transition = self.scheduler.tick();
        (self.scheduler.status(), transition)
    }

    /// Tick once per second until `running` goes false.
    ///
    /// `on_tick` sees the scheduler after every tick, so it can apply
    /// requested actions and settings before the next one.
    pub fn run<F>(&mut self, running: &AtomicBool, mut on_tick: F)
    where
        F: FnMut(&mut BreakScheduler, &Status, Option<Transition>),
    {
        let ticker = crossbeam_channel::tick(TICK);

        while running.load(Ordering::SeqCst) {
            match ticker.recv_timeout(STOP_CHECK_INTERVAL) {
                Ok(_) => {
                    let (status, transition) = self.step();
                    on_tick(&mut self.scheduler, &status, transition);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Stop and join every probe.
    pub fn shutdown(&mut self) {
        if !self.probes.is_empty() {
            info!("Stopping {} probe(s)", self.probes.len());
        }
        self.probes.stop_all();
    }

    pub fn scheduler(&self) -> &BreakScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut BreakScheduler {
        &mut self.scheduler
    }

    pub fn monitor(&self) -> &SharedActivityMonitor {
        &self.monitor
    }

    pub fn session_log(&self) -> &SharedSessionLog {
        self.monitor.session_log()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Names of the running probes.
    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.names()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
