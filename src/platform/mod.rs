//! OS backends for the probes.
//!
//! Each backend provides an [`InputHook`] (global keyboard/pointer events),
//! a [`SystemWindowSource`] (foreground window identity) and a
//! [`SystemFrameSource`] (primary display capture). Platforms without a
//! backend get the noop implementation and report no capabilities.

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

// Re-export commonly used types
pub use types::{frame_from_bgra, ForegroundWindow, InputEvent, InputKind, PlatformError};

#[cfg(target_os = "macos")]
pub use macos::{capabilities, check_permission, InputHook, SystemFrameSource, SystemWindowSource};

#[cfg(target_os = "windows")]
pub use self::windows::{
    capabilities, check_permission, InputHook, SystemFrameSource, SystemWindowSource,
};

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{capabilities, check_permission, InputHook, SystemFrameSource, SystemWindowSource};

/// Capacity of the channel between an input hook and the input probe.
pub(crate) const INPUT_CHANNEL_CAPACITY: usize = 10_000;
