//! Transparency module for restwatch.
//!
//! Tracks what the engine observed during the current session so the user
//! can see exactly which signals kept the work timer running.

pub mod log;

// Re-export commonly used types
pub use log::{SessionLog, SessionStats, SharedSessionLog};
