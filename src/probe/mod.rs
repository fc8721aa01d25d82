//! Signal probes.
//!
//! Each probe runs on its own thread, watches one source of evidence that
//! the user is present, and reports to the shared [`ActivityMonitor`]. A
//! probe never stops because of a platform error: the failure is logged and
//! the next cycle runs as usual. Stopping is cooperative through a
//! `running` flag that every loop checks at least every 100ms.
//!
//! [`ActivityMonitor`]: crate::activity::ActivityMonitor

pub mod input;
pub mod screen;
pub mod window;

pub use input::InputProbe;
pub use screen::{FrameSource, ScreenProbe, ScreenSample, SAMPLE_SIZE};
pub use window::{WindowProbe, WindowSource};

use crate::platform::PlatformError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest a probe sleeps before rechecking its running flag.
pub(crate) const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from a single probe cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    Platform(PlatformError),
    /// A captured frame could not be turned into a sample.
    InvalidFrame(String),
    /// The probe thread could not be started.
    Spawn(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Platform(e) => write!(f, "{e}"),
            ProbeError::InvalidFrame(e) => write!(f, "Invalid frame: {e}"),
            ProbeError::Spawn(e) => write!(f, "Failed to start probe thread: {e}"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<PlatformError> for ProbeError {
    fn from(e: PlatformError) -> Self {
        ProbeError::Platform(e)
    }
}

/// A running probe thread.
pub struct ProbeHandle {
    name: &'static str,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    /// Run `body` on a named thread. The body receives the running flag and
    /// must return soon after it turns false.
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self, ProbeError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let thread = thread::Builder::new()
            .name(format!("restwatch-{name}"))
            .spawn(move || body(flag))
            .map_err(|e| ProbeError::Spawn(e.to_string()))?;

        debug!("Started {name} probe");
        Ok(Self {
            name,
            running,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the probe thread is still looping.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the probe to stop without waiting for it.
    pub fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the probe and wait for its thread to exit.
    pub fn stop(&mut self) {
        self.signal_stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!("Stopped {} probe", self.name);
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ProbeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeHandle")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// The probes owned by an engine.
#[derive(Debug, Default)]
pub struct ProbeSet {
    handles: Vec<ProbeHandle>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ProbeHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handles.iter().map(ProbeHandle::name).collect()
    }

    /// Signal every probe first, then join them, so shutdown takes as long
    /// as the slowest probe rather than the sum of all of them.
    pub fn stop_all(&mut self) {
        for handle in &self.handles {
            handle.signal_stop();
        }
        for mut handle in self.handles.drain(..) {
            handle.stop();
        }
    }
}

/// Sleep for `duration` in short slices, returning early once `running`
/// goes false. Returns whether the probe should keep going.
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_sleep_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_while_running(&running, Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_completes_while_running() {
        let running = AtomicBool::new(true);
        assert!(sleep_while_running(&running, Duration::from_millis(20)));
    }

    #[test]
    fn test_handle_stop_joins_thread() {
        let loops = Arc::new(AtomicUsize::new(0));
        let counter = loops.clone();

        let mut handle = ProbeHandle::spawn("test", move |running| {
            while sleep_while_running(&running, Duration::from_millis(5)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        assert_eq!(handle.name(), "test");
        thread::sleep(Duration::from_millis(50));
        handle.stop();
        assert!(!handle.is_running());

        let seen = loops.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(loops.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_probe_set_stops_everything() {
        let mut set = ProbeSet::new();
        for name in ["a", "b", "c"] {
            set.push(
                ProbeHandle::spawn(name, |running| {
                    while sleep_while_running(&running, Duration::from_secs(60)) {}
                })
                .unwrap(),
            );
        }
        assert_eq!(set.len(), 3);
        assert_eq!(set.names(), vec!["a", "b", "c"]);

        let start = Instant::now();
        set.stop_all();
        assert!(set.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_error_display() {
        let err = ProbeError::from(PlatformError::NoForegroundWindow);
        assert_eq!(err.to_string(), "No foreground window");
        assert!(ProbeError::Spawn("boom".into()).to_string().contains("boom"));
    }
}
