//! Foreground-window probe.
//!
//! Switching to another window is taken as evidence the user is there.
//! Windows are compared by their opaque id; the title is only logged.

use crate::activity::{SharedActivityMonitor, SignalSource};
use crate::platform::{ForegroundWindow, PlatformError};
use crate::probe::{sleep_while_running, ProbeError, ProbeHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can name the current foreground window.
pub trait WindowSource: Send {
    fn foreground_window(&mut self) -> Result<ForegroundWindow, PlatformError>;
}

pub struct WindowProbe<S> {
    source: S,
    monitor: SharedActivityMonitor,
    last_window: Option<u64>,
}

impl<S: WindowSource + 'static> WindowProbe<S> {
    pub fn new(source: S, monitor: SharedActivityMonitor) -> Self {
        Self {
            source,
            monitor,
            last_window: None,
        }
    }

    /// Query the foreground window once.
    ///
    /// Returns whether it differed from the previous observation (the first
    /// observation always does) and activity was reported.
    pub fn poll_once(&mut self) -> Result<bool, ProbeError> {
        let window = self.source.foreground_window()?;

        if self.last_window == Some(window.id) {
            return Ok(false);
        }

        debug!("Foreground window changed: {}", window.title);
        self.last_window = Some(window.id);
        self.monitor.report_activity(SignalSource::Window);
        Ok(true)
    }

    pub fn run(mut self, running: &AtomicBool, interval: Duration) {
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.poll_once() {
                warn!("Window probe: {e}");
            }
            if !sleep_while_running(running, interval) {
                break;
            }
        }
    }

    /// Poll every `interval` on a dedicated thread.
    pub fn spawn(self, interval: Duration) -> Result<ProbeHandle, ProbeError> {
        ProbeHandle::spawn("window", move |running| self.run(&running, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityMonitor;
    use crate::clock::{Clock, ManualClock};
    use crate::transparency::SessionLog;
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct ScriptedWindows(VecDeque<Result<ForegroundWindow, PlatformError>>);

    impl ScriptedWindows {
        fn new(script: Vec<Result<(u64, &str), PlatformError>>) -> Self {
            Self(
                script
                    .into_iter()
                    .map(|r| {
                        r.map(|(id, title)| ForegroundWindow {
                            id,
                            title: title.to_string(),
                        })
                    })
                    .collect(),
            )
        }
    }

    impl WindowSource for ScriptedWindows {
        fn foreground_window(&mut self) -> Result<ForegroundWindow, PlatformError> {
            self.0
                .pop_front()
                .unwrap_or(Err(PlatformError::NoForegroundWindow))
        }
    }

    fn monitor() -> (Arc<ManualClock>, SharedActivityMonitor) {
        let clock = Arc::new(ManualClock::at_epoch());
        let monitor = ActivityMonitor::shared(clock.clone(), Arc::new(SessionLog::new()));
        (clock, monitor)
    }

    #[test]
    fn test_reports_only_on_change() {
        let (clock, monitor) = monitor();
        let source = ScriptedWindows::new(vec![
            Ok((1, "Editor")),
            Ok((1, "Editor - saved")),
            Ok((2, "Browser")),
            Ok((1, "Editor")),
        ]);
        let mut probe = WindowProbe::new(source, monitor.clone());

        let mut changes = Vec::new();
        for _ in 0..4 {
            clock.advance_secs(1);
            changes.push(probe.poll_once().unwrap());
        }

        // A title change on the same window is not a switch
        assert_eq!(changes, vec![true, false, true, true]);
        assert_eq!(monitor.session_log().stats().window_signals, 3);
        assert_eq!(monitor.last_activity_time(), clock.now());
    }

    #[test]
    fn test_error_keeps_previous_window() {
        let (_, monitor) = monitor();
        let source = ScriptedWindows::new(vec![
            Ok((7, "Terminal")),
            Err(PlatformError::NoForegroundWindow),
            Ok((7, "Terminal")),
        ]);
        let mut probe = WindowProbe::new(source, monitor);

        assert_eq!(probe.poll_once(), Ok(true));
        assert_eq!(
            probe.poll_once(),
            Err(ProbeError::Platform(PlatformError::NoForegroundWindow))
        );
        assert_eq!(probe.poll_once(), Ok(false));
    }

    #[test]
    fn test_paused_monitor_ignores_switches() {
        let (clock, monitor) = monitor();
        let before = monitor.last_activity_time();
        monitor.set_paused(true);

        let source = ScriptedWindows::new(vec![Ok((1, "a")), Ok((2, "b"))]);
        let mut probe = WindowProbe::new(source, monitor.clone());
        clock.advance_secs(5);
        probe.poll_once().unwrap();
        probe.poll_once().unwrap();

        assert_eq!(monitor.last_activity_time(), before);
        assert_eq!(monitor.session_log().stats().ignored_signals, 2);
    }

    #[test]
    fn test_spawned_probe_survives_errors() {
        let (_, monitor) = monitor();
        // Every poll fails; the thread must keep looping until stopped
        let source = ScriptedWindows::new(Vec::new());
        let mut handle = WindowProbe::new(source, monitor)
            .spawn(Duration::from_millis(5))
            .unwrap();

        std::thread::sleep(Duration::from_millis(40));
        assert!(handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
    }
}
