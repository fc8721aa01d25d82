//! Fallback backend for platforms without input hooks or screen capture.
//!
//! This exists so the crate (and binary) compiles everywhere; the engine
//! still runs, driven only by whatever probes [`capabilities`] reports.

use crate::config::ProbeConfig;
use crate::platform::types::{ForegroundWindow, InputEvent, PlatformError};
use crate::platform::INPUT_CHANNEL_CAPACITY;
use crate::probe::screen::FrameSource;
use crate::probe::window::WindowSource;
use crossbeam_channel::{bounded, Receiver, Sender};
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An input hook that never emits events.
pub struct InputHook {
    _sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
}

impl InputHook {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(INPUT_CHANNEL_CAPACITY);
        Self {
            _sender: sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the hook as running.
    pub fn start(&mut self) -> Result<(), PlatformError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PlatformError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }
}

impl Default for InputHook {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground window lookup is unavailable here.
#[derive(Debug, Default)]
pub struct SystemWindowSource;

impl WindowSource for SystemWindowSource {
    fn foreground_window(&mut self) -> Result<ForegroundWindow, PlatformError> {
        Err(PlatformError::Unsupported("foreground window lookup"))
    }
}

/// Screen capture is unavailable here.
#[derive(Debug, Default)]
pub struct SystemFrameSource;

impl FrameSource for SystemFrameSource {
    fn capture(&mut self) -> Result<DynamicImage, PlatformError> {
        Err(PlatformError::Unsupported("screen capture"))
    }
}

/// No probe has a working backend on this platform.
pub fn capabilities() -> ProbeConfig {
    ProbeConfig {
        input: false,
        window: false,
        screen: false,
    }
}

/// There is no permission gate on platforms without hooks.
pub fn check_permission() -> bool {
    true
}
