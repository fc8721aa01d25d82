//! Collaborator interfaces invoked by the scheduler on break transitions.
//!
//! The scheduler calls each hook exactly once per transition and never waits
//! on the side effects they trigger. Hooks must not call back into the
//! scheduler.

use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Receives rewards for completed work and break episodes.
pub trait RewardHook: Send + Sync {
    /// A work episode finished; `minutes` is the configured work duration.
    fn on_points_earned(&self, minutes: u32);

    /// A break finished.
    fn on_break_completed(&self);
}

/// Responsible for sound, screensaver and prompts around breaks.
pub trait AlertHook: Send + Sync {
    fn on_break_started(&self);

    fn on_break_ended(&self);
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl RewardHook for NoopHooks {
    fn on_points_earned(&self, _minutes: u32) {}

    fn on_break_completed(&self) {}
}

impl AlertHook for NoopHooks {
    fn on_break_started(&self) {}

    fn on_break_ended(&self) {}
}

/// Suggestions shown when a break starts.
pub const BREAK_SUGGESTIONS: [&str; 4] = [
    "Stretch your body",
    "Look at distant objects",
    "Drink some water",
    "Take deep breaths",
];

/// Prints break prompts to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAlerts;

impl AlertHook for ConsoleAlerts {
    fn on_break_started(&self) {
        // BEL so terminals that support it make a sound
        println!("\x07");
        println!("Time to take a break!");
        for suggestion in BREAK_SUGGESTIONS {
            println!("  • {suggestion}");
        }
        println!("Run `restwatch end-break` to end the break early.");
    }

    fn on_break_ended(&self) {
        println!("\x07");
        println!("Break over. Ready to continue working?");
        println!("The timer stays paused until you run `restwatch resume`.");
    }
}

/// Runs user-configured shell commands on break transitions.
///
/// This is where sound playback or screensaver toggling gets plugged in.
/// Commands are spawned and reaped on a helper thread, never awaited.
#[derive(Debug, Default, Clone)]
pub struct CommandAlerts {
    on_start: Option<String>,
    on_end: Option<String>,
}

impl CommandAlerts {
    pub fn new(on_start: Option<String>, on_end: Option<String>) -> Self {
        Self { on_start, on_end }
    }

    pub fn is_empty(&self) -> bool {
        self.on_start.is_none() && self.on_end.is_none()
    }

    fn spawn(command: &str) {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null());

        match cmd.spawn() {
            Ok(mut child) => {
                let command = command.to_string();
                thread::spawn(move || match child.wait() {
                    Ok(status) if status.success() => debug!("Alert command finished: {command}"),
                    Ok(status) => warn!("Alert command {command:?} exited with {status}"),
                    Err(e) => warn!("Could not wait for alert command {command:?}: {e}"),
                });
            }
            Err(e) => warn!("Could not run alert command {command:?}: {e}"),
        }
    }
}

impl AlertHook for CommandAlerts {
    fn on_break_started(&self) {
        if let Some(ref command) = self.on_start {
            Self::spawn(command);
        }
    }

    fn on_break_ended(&self) {
        if let Some(ref command) = self.on_end {
            Self::spawn(command);
        }
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

/// Forwards every alert to several hooks in order.
#[derive(Default, Clone)]
pub struct AlertFanout {
    hooks: Vec<Arc<dyn AlertHook>>,
}

impl AlertFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn AlertHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl AlertHook for AlertFanout {
    fn on_break_started(&self) {
        for hook in &self.hooks {
            hook.on_break_started();
        }
    }

    fn on_break_ended(&self) {
        for hook in &self.hooks {
            hook.on_break_ended();
        }
    }
}
