//! restwatch - activity-aware break reminders.
//!
//! Three probes watch for signs that the user is at the computer: keyboard
//! and pointer input, foreground window switches, and gross changes in
//! screen content. They all feed one [`ActivityMonitor`], and a
//! [`BreakScheduler`] ticked once per second turns recent activity into
//! credited work time. When enough has been credited a break starts; idle
//! time slowly takes credit back.
//!
//! # Privacy Guarantees
//!
//! - **No key content**: only the fact that input happened is recorded
//! - **No coordinates**: pointer positions are never read
//! - **No screenshots kept**: each capture is reduced to a 32x32 grayscale
//!   thumbnail in memory, compared once, then replaced
//! - **Transparency**: honored and ignored signals are counted per session
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         restwatch                         │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐                    │
//! │  │  Input  │  │ Window  │  │ Screen  │   probes           │
//! │  └────┬────┘  └────┬────┘  └────┬────┘                    │
//! │       └────────────┼────────────┘                         │
//! │                    ▼                                      │
//! │            ┌───────────────┐      ┌──────────────┐        │
//! │            │   Activity    │─────▶│   Session    │        │
//! │            │   Monitor     │      │     Log      │        │
//! │            └───────┬───────┘      └──────────────┘        │
//! │                    ▼                                      │
//! │            ┌───────────────┐      ┌──────────────┐        │
//! │            │    Break      │─────▶│ Reward/Alert │        │
//! │            │  Scheduler    │      │    hooks     │        │
//! │            └───────────────┘      └──────────────┘        │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use restwatch::{Engine, EngineSettings, NoopHooks, ProbeConfig, SystemClock};
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let mut engine = Engine::new(
//!     EngineSettings::default(),
//!     Arc::new(SystemClock::new()),
//!     Arc::new(NoopHooks),
//!     Arc::new(NoopHooks),
//! );
//! engine.start_probes(ProbeConfig::default());
//!
//! let running = AtomicBool::new(true);
//! engine.run(&running, |_scheduler, status, _transition| {
//!     println!("{} {}", status.mode, status.remaining_clock());
//! });
//! ```
//!
//! [`ActivityMonitor`]: activity::ActivityMonitor
//! [`BreakScheduler`]: scheduler::BreakScheduler

pub mod activity;
pub mod clock;
pub mod config;
pub mod control;
pub mod engine;
pub mod hooks;
pub mod platform;
pub mod probe;
pub mod rewards;
pub mod scheduler;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use activity::{ActivityMonitor, SharedActivityMonitor, SignalSource};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{BreakSettings, Config, ConfigError, DurationKind, EngineSettings, ProbeConfig};
pub use control::{ControlMessage, ControlRequest};
pub use engine::Engine;
pub use hooks::{AlertFanout, AlertHook, CommandAlerts, ConsoleAlerts, NoopHooks, RewardHook};
pub use rewards::{PersistentRewards, RewardLedger};
pub use scheduler::{ActionError, BreakScheduler, Mode, Status, Transition};
pub use transparency::{SessionLog, SessionStats, SharedSessionLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 RESTWATCH - PRIVACY DECLARATION                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  restwatch watches for signs that you are at the computer so     ║
║  it can tell you when to take a break.                           ║
║                                                                  ║
║  ✓ WHAT WE LOOK AT:                                              ║
║    • That a key was pressed (not which one)                      ║
║    • That the pointer moved, clicked or scrolled (not where)     ║
║    • That the foreground window changed                          ║
║    • How much the screen changed between two checks              ║
║                                                                  ║
║  ✗ WHAT WE NEVER STORE:                                          ║
║    • Which keys you press (no passwords, messages, etc.)         ║
║    • Where your cursor is                                        ║
║    • Screen images: each check keeps a 32x32 grayscale           ║
║      thumbnail in memory only until the next check               ║
║    • Window titles (used for debug logging only)                 ║
║                                                                  ║
║  Only the timer status, session counters and your rewards are    ║
║  written to disk, in your local data directory.                  ║
║                                                                  ║
║  You can view session statistics anytime with:                   ║
║    restwatch status                                              ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
