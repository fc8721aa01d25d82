//! macOS backend.
//!
//! Input comes from a listen-only CGEvent tap (requires Input Monitoring
//! permission), the foreground window from the on-screen window list, and
//! frames from CoreGraphics display capture (requires Screen Recording
//! permission).

use crate::config::ProbeConfig;
use crate::platform::types::{
    frame_from_bgra, ForegroundWindow, InputEvent, InputKind, PlatformError,
};
use crate::platform::INPUT_CHANNEL_CAPACITY;
use crate::probe::screen::FrameSource;
use crate::probe::window::WindowSource;
use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_foundation::string::CFString;
use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult,
};
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Global keyboard and pointer hook backed by a CGEvent tap.
pub struct InputHook {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl InputHook {
    pub fn new() -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit
        let (sender, receiver) = bounded(INPUT_CHANNEL_CAPACITY);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start the event tap on a background thread.
    pub fn start(&mut self) -> Result<(), PlatformError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PlatformError::AlreadyRunning);
        }
        if !check_permission() {
            return Err(PlatformError::PermissionDenied(
                "Input Monitoring permission not granted".to_string(),
            ));
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone()) {
                warn!("Input event loop stopped: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes at least every 100ms to check the flag
            let _ = handle.join();
        }
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

impl Drop for InputHook {
    fn drop(&mut self) {
        self.stop();
    }
}

const TAPPED_EVENTS: [CGEventType; 10] = [
    CGEventType::KeyDown,
    CGEventType::FlagsChanged,
    CGEventType::MouseMoved,
    CGEventType::LeftMouseDown,
    CGEventType::RightMouseDown,
    CGEventType::OtherMouseDown,
    CGEventType::LeftMouseDragged,
    CGEventType::RightMouseDragged,
    CGEventType::OtherMouseDragged,
    CGEventType::ScrollWheel,
];

fn run_event_loop(
    sender: Sender<InputEvent>,
    running: Arc<AtomicBool>,
) -> Result<(), PlatformError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        TAPPED_EVENTS.to_vec(),
        move |_proxy, event_type, _event: &CGEvent| {
            if let Some(kind) = classify(event_type) {
                // Never block the tap; a full channel just drops the event
                let _ = sender.try_send(InputEvent::new(kind));
            }
            CallbackResult::Keep
        },
    )
    .map_err(|_| PlatformError::HookFailed("could not create CGEvent tap".to_string()))?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| PlatformError::HookFailed("could not create run loop source".to_string()))?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}

fn classify(event_type: CGEventType) -> Option<InputKind> {
    use core_graphics::event::CGEventType::*;

    match event_type {
        KeyDown | FlagsChanged => Some(InputKind::KeyPress),
        MouseMoved | LeftMouseDragged | RightMouseDragged | OtherMouseDragged => {
            Some(InputKind::PointerMove)
        }
        LeftMouseDown | RightMouseDown | OtherMouseDown => Some(InputKind::Click),
        ScrollWheel => Some(InputKind::Scroll),
        _ => None,
    }
}

/// Foreground window from the front-to-back on-screen window list.
#[derive(Debug, Default)]
pub struct SystemWindowSource;

impl WindowSource for SystemWindowSource {
    fn foreground_window(&mut self) -> Result<ForegroundWindow, PlatformError> {
        let windows = copy_window_info(
            kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements,
            kCGNullWindowID,
        )
        .ok_or(PlatformError::NoForegroundWindow)?;

        for raw in windows.get_all_values() {
            let info: CFDictionary<CFString, CFType> =
                unsafe { CFDictionary::wrap_under_get_rule(raw as CFDictionaryRef) };

            // Layer 0 holds normal application windows; the first is frontmost
            if number_field(&info, "kCGWindowLayer") != Some(0) {
                continue;
            }
            let Some(id) = number_field(&info, "kCGWindowNumber") else {
                continue;
            };

            let owner = string_field(&info, "kCGWindowOwnerName").unwrap_or_default();
            let title = match string_field(&info, "kCGWindowName") {
                Some(name) if !name.is_empty() => format!("{owner} - {name}"),
                _ => owner,
            };

            return Ok(ForegroundWindow {
                id: id as u64,
                title,
            });
        }

        Err(PlatformError::NoForegroundWindow)
    }
}

fn number_field(info: &CFDictionary<CFString, CFType>, key: &'static str) -> Option<i64> {
    info.find(CFString::from_static_string(key))
        .and_then(|value| value.downcast::<CFNumber>())
        .and_then(|number| number.to_i64())
}

fn string_field(info: &CFDictionary<CFString, CFType>, key: &'static str) -> Option<String> {
    info.find(CFString::from_static_string(key))
        .and_then(|value| value.downcast::<CFString>())
        .map(|value| value.to_string())
}

/// Captures the main display.
#[derive(Debug, Default)]
pub struct SystemFrameSource;

impl FrameSource for SystemFrameSource {
    fn capture(&mut self) -> Result<DynamicImage, PlatformError> {
        let image = CGDisplay::main().image().ok_or_else(|| {
            PlatformError::CaptureFailed(
                "no display image (is Screen Recording permission granted?)".to_string(),
            )
        })?;

        if image.bits_per_pixel() != 32 {
            return Err(PlatformError::CaptureFailed(format!(
                "unsupported pixel format: {} bits per pixel",
                image.bits_per_pixel()
            )));
        }

        let data = image.data();
        frame_from_bgra(
            data.bytes(),
            image.width(),
            image.height(),
            image.bytes_per_row(),
        )
    }
}

/// All three probes have a backend on macOS.
pub fn capabilities() -> ProbeConfig {
    ProbeConfig {
        input: true,
        window: true,
        screen: true,
    }
}

/// Check whether an event tap can be created.
///
/// macOS has no direct query for Input Monitoring; creating a passive tap
/// fails when the permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}
