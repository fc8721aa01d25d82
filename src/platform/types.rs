//! Platform-neutral types shared by the OS backends.
//!
//! Input events carry only their kind and time: never key codes or pointer
//! coordinates.

use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbaImage};
use std::fmt;

/// Kind of low-level input the OS reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    KeyPress,
    PointerMove,
    Click,
    Scroll,
}

/// A single input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: InputKind,
}

impl InputEvent {
    pub fn new(kind: InputKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Opaque identity of the foreground window plus its title for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundWindow {
    pub id: u64,
    pub title: String,
}

/// Errors from OS-facing calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// This platform has no backend for the requested capability.
    Unsupported(&'static str),
    AlreadyRunning,
    PermissionDenied(String),
    HookFailed(String),
    NoForegroundWindow,
    CaptureFailed(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Unsupported(what) => {
                write!(f, "{what} is not supported on this platform")
            }
            PlatformError::AlreadyRunning => write!(f, "Input hook is already running"),
            PlatformError::PermissionDenied(e) => write!(f, "Permission denied: {e}"),
            PlatformError::HookFailed(e) => write!(f, "Failed to install input hook: {e}"),
            PlatformError::NoForegroundWindow => write!(f, "No foreground window"),
            PlatformError::CaptureFailed(e) => write!(f, "Screen capture failed: {e}"),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Build an image from a 32-bit BGRA buffer with `stride` bytes per row.
///
/// Both the CoreGraphics and GDI captures produce this layout.
pub fn frame_from_bgra(
    bytes: &[u8],
    width: usize,
    height: usize,
    stride: usize,
) -> Result<DynamicImage, PlatformError> {
    if width == 0 || height == 0 {
        return Err(PlatformError::CaptureFailed("empty frame".to_string()));
    }
    if stride < width * 4 || bytes.len() < stride * (height - 1) + width * 4 {
        return Err(PlatformError::CaptureFailed(format!(
            "buffer of {} bytes too small for {width}x{height} (stride {stride})",
            bytes.len()
        )));
    }

    let mut rgba = Vec::with_capacity(width * height * 4);
    for row in bytes.chunks(stride).take(height) {
        for pixel in row[..width * 4].chunks_exact(4) {
            rgba.extend_from_slice(&[pixel[2], pixel[1], pixel[0], 255]);
        }
    }

    RgbaImage::from_raw(width as u32, height as u32, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| PlatformError::CaptureFailed("frame size mismatch".to_string()))
}
