//! Input probe: forwards every keyboard and pointer event as activity.
//!
//! There is no debouncing here; the monitor only keeps a timestamp, which
//! is all the coalescing needed.

use crate::activity::{SharedActivityMonitor, SignalSource};
use crate::platform::{InputEvent, InputHook};
use crate::probe::{ProbeError, ProbeHandle, STOP_CHECK_INTERVAL};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

pub struct InputProbe {
    receiver: Receiver<InputEvent>,
    monitor: SharedActivityMonitor,
}

impl InputProbe {
    pub fn new(receiver: Receiver<InputEvent>, monitor: SharedActivityMonitor) -> Self {
        Self { receiver, monitor }
    }

    /// Drain events until stopped or the hook disconnects. Returns the
    /// number of events forwarded.
    pub fn run(&self, running: &AtomicBool) -> u64 {
        let mut forwarded = 0;

        while running.load(Ordering::SeqCst) {
            match self.receiver.recv_timeout(STOP_CHECK_INTERVAL) {
                Ok(_event) => {
                    self.monitor.report_activity(SignalSource::Input);
                    forwarded += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Input hook disconnected; input probe stopping");
                    break;
                }
            }
        }

        forwarded
    }

    /// Start `hook` and forward its events on a dedicated thread. The hook
    /// is owned by that thread and stopped when it exits.
    pub fn spawn_with_hook(
        mut hook: InputHook,
        monitor: SharedActivityMonitor,
    ) -> Result<ProbeHandle, ProbeError> {
        hook.start()?;
        let probe = Self::new(hook.receiver().clone(), monitor);

        ProbeHandle::spawn("input", move |running| {
            probe.run(&running);
            hook.stop();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityMonitor;
    use crate::clock::{Clock, ManualClock};
    use crate::platform::InputKind;
    use crate::transparency::SessionLog;
    use crossbeam_channel::unbounded;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn monitor() -> (Arc<ManualClock>, SharedActivityMonitor) {
        let clock = Arc::new(ManualClock::at_epoch());
        let monitor = ActivityMonitor::shared(clock.clone(), Arc::new(SessionLog::new()));
        (clock, monitor)
    }

    #[test]
    fn test_every_event_is_forwarded() {
        let (clock, monitor) = monitor();
        let (sender, receiver) = unbounded();
        let probe = InputProbe::new(receiver, monitor.clone());

        clock.advance_secs(3);
        for kind in [
            InputKind::KeyPress,
            InputKind::PointerMove,
            InputKind::Click,
            InputKind::Scroll,
        ] {
            sender.send(InputEvent::new(kind)).unwrap();
        }
        drop(sender);

        let running = AtomicBool::new(true);
        assert_eq!(probe.run(&running), 4);
        assert_eq!(monitor.session_log().stats().input_signals, 4);
        assert_eq!(monitor.last_activity_time(), clock.now());
    }

    #[test]
    fn test_stops_on_flag() {
        let (_, monitor) = monitor();
        let (_sender, receiver) = unbounded::<InputEvent>();
        let probe = InputProbe::new(receiver, monitor);

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let worker = thread::spawn(move || probe.run(&flag));

        thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::SeqCst);
        assert_eq!(worker.join().unwrap(), 0);
    }

    #[test]
    fn test_paused_events_are_ignored() {
        let (_, monitor) = monitor();
        monitor.set_paused(true);
        let (sender, receiver) = unbounded();
        let probe = InputProbe::new(receiver, monitor.clone());

        sender.send(InputEvent::new(InputKind::KeyPress)).unwrap();
        drop(sender);
        probe.run(&AtomicBool::new(true));

        let stats = monitor.session_log().stats();
        assert_eq!(stats.input_signals, 0);
        assert_eq!(stats.ignored_signals, 1);
    }
}
