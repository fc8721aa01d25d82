//! restwatch CLI
//!
//! Activity-aware break reminder.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use restwatch::{
    clock::SystemClock,
    config::{BreakSettings, Config, DurationKind, ProbeConfig},
    control::{self, ControlMessage, ControlRequest},
    hooks::{AlertFanout, AlertHook, CommandAlerts, ConsoleAlerts},
    platform::check_permission,
    rewards::{PersistentRewards, RewardLedger},
    scheduler::{BreakScheduler, Mode, Status},
    transparency::SessionStats,
    Engine, PRIVACY_DECLARATION, VERSION,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "RESTWATCH_LOG";

/// Seconds between periodic status lines while the mode is unchanged.
const STATUS_LINE_INTERVAL_SECS: i64 = 60;

/// A status file older than this most likely belongs to a stopped engine.
const STATUS_STALE_SECS: i64 = 5;

#[derive(Parser)]
#[command(name = "restwatch")]
#[command(version = VERSION)]
#[command(about = "Activity-aware break reminder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the break timer in the foreground
    Start {
        /// Do not watch keyboard and pointer input
        #[arg(long)]
        no_input: bool,

        /// Do not watch foreground window switches
        #[arg(long)]
        no_window: bool,

        /// Do not sample screen content
        #[arg(long)]
        no_screen: bool,

        /// Log every signal and state change
        #[arg(long, short)]
        verbose: bool,
    },

    /// Pause the timer
    Pause,

    /// Resume the timer (also acknowledges a finished break)
    Resume,

    /// Change the work and break durations
    Set {
        /// Work duration in minutes (15-90)
        #[arg(long)]
        work: Option<String>,

        /// Break duration in minutes (1-15)
        #[arg(long = "break")]
        break_minutes: Option<String>,
    },

    /// Hold the work timer for a few minutes
    Snooze,

    /// Start a break now
    Break,

    /// End the current break early
    EndBreak,

    /// Show the current timer status
    Status,

    /// Show points, streak and weekly challenges
    Rewards,

    /// Show configuration
    Config,

    /// Display privacy declaration
    Privacy,
}

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Start { verbose: true, .. });
    init_tracing(verbose);

    let result = match cli.command {
        Commands::Start {
            no_input,
            no_window,
            no_screen,
            verbose: _,
        } => cmd_start(no_input, no_window, no_screen),
        Commands::Pause => cmd_set_paused(true),
        Commands::Resume => cmd_set_paused(false),
        Commands::Set {
            work,
            break_minutes,
        } => cmd_set(work.as_deref(), break_minutes.as_deref()),
        Commands::Snooze => cmd_request(ControlRequest::Snooze),
        Commands::Break => cmd_request(ControlRequest::ForceBreak),
        Commands::EndBreak => cmd_request(ControlRequest::EndBreak),
        Commands::Status => cmd_status(),
        Commands::Rewards => cmd_rewards(),
        Commands::Config => cmd_config(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "restwatch=debug"
    } else {
        "restwatch=info"
    };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!("Using default configuration: {e}");
        Config::default()
    })
}

fn cmd_start(no_input: bool, no_window: bool, no_screen: bool) -> Result<()> {
    println!("restwatch v{VERSION}");
    println!();

    let config = load_config();
    config.validate().context("invalid configuration")?;
    if let Err(e) = config.ensure_directories() {
        warn!("Could not create data directory: {e}");
    }

    let requested = ProbeConfig {
        input: config.probes.input && !no_input,
        window: config.probes.window && !no_window,
        screen: config.probes.screen && !no_screen,
    };

    let clock = Arc::new(SystemClock::new());
    let rewards = Arc::new(PersistentRewards::open(config.rewards_path(), clock.clone()));

    let mut alerts = AlertFanout::new().with(Arc::new(ConsoleAlerts));
    let commands = CommandAlerts::new(
        config.alerts.on_break_start.clone(),
        config.alerts.on_break_end.clone(),
    );
    if !commands.is_empty() {
        alerts = alerts.with(Arc::new(commands));
    }
    let alerts: Arc<dyn AlertHook> = Arc::new(alerts);

    let mut engine = Engine::new(config.engine_settings(), clock, rewards, alerts);
    let started = engine.start_probes(requested);

    println!(
        "  Work: {} min, break: {} min",
        config.work_minutes, config.break_minutes
    );
    println!("  Input probe: {}", probe_state(requested.input, started.input));
    println!("  Window probe: {}", probe_state(requested.window, started.window));
    println!("  Screen probe: {}", probe_state(requested.screen, started.screen));
    println!();

    if config.paused {
        engine.scheduler_mut().set_paused(true);
        println!("The timer is currently paused.");
        println!("Run `restwatch resume` to start measuring.");
        println!();
    }

    println!("Press Ctrl+C to stop");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let started_at = engine.started_at();
    let status_path = config.status_path();
    let control_path = config.control_path();
    let mut last_config = config.clone();
    let mut last_mode: Option<Mode> = None;
    let mut last_line_at: Option<DateTime<Utc>> = None;

    engine.run(&running, |scheduler, _status, _transition| {
        // Pick up `pause`, `resume` and `set` from other processes
        poll_config(scheduler, &mut last_config);
        poll_control(scheduler, &control_path, started_at);
        // A finished break leaves the timer paused; record it so that
        // `resume` registers as a change
        if scheduler.is_paused() && !last_config.paused {
            persist_paused(&mut last_config);
        }

        let status = scheduler.status();

        if let Err(e) = status.save(&status_path) {
            debug!("Could not write status file: {e}");
        }

        let line_due = last_line_at.map_or(true, |at| {
            (status.at - at).num_seconds() >= STATUS_LINE_INTERVAL_SECS
        });
        if last_mode != Some(status.mode) || line_due {
            println!("{}", status_line(&status));
            last_mode = Some(status.mode);
            last_line_at = Some(status.at);
        }
    });

    println!();
    println!("Stopping...");
    engine.shutdown();

    if status_path.exists() {
        let _ = std::fs::remove_file(&status_path);
    }
    if let Err(e) = engine.session_log().save(&config.session_path()) {
        warn!("Could not save session log: {e}");
    }

    println!();
    println!("{}", engine.session_log().summary());
    Ok(())
}

fn probe_state(requested: bool, started: bool) -> &'static str {
    match (requested, started) {
        (false, _) => "disabled",
        (true, true) => "running",
        (true, false) => "unavailable",
    }
}

/// Apply changes made to the config file since the last poll.
fn poll_config(scheduler: &mut BreakScheduler, last: &mut Config) {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            debug!("Ignoring unreadable config: {e}");
            return;
        }
    };

    if config.paused != last.paused {
        scheduler.set_paused(config.paused);
    }

    let settings = config.break_settings();
    if settings != last.break_settings() {
        if let Err(e) = scheduler.apply_settings(settings) {
            warn!("Ignoring new durations: {e}");
        }
    }

    *last = config;
}

/// Apply a pending one-shot request, if any.
fn poll_control(scheduler: &mut BreakScheduler, path: &Path, started_at: DateTime<Utc>) {
    let message = match control::take_request(path) {
        Ok(Some(message)) => message,
        Ok(None) => return,
        Err(e) => {
            warn!("{e}");
            return;
        }
    };

    if message.is_stale(started_at) {
        info!("Dropping {} request issued before startup", message.request);
        return;
    }
    if let Err(e) = control::apply(scheduler, message.request) {
        warn!("Dropping {} request: {e}", message.request);
    }
}

fn persist_paused(last: &mut Config) {
    let mut config = Config::load().unwrap_or_else(|_| last.clone());
    config.paused = true;
    match config.save() {
        Ok(()) => *last = config,
        Err(e) => warn!("Could not record pause in config: {e}"),
    }
}

fn status_line(status: &Status) -> String {
    let mut line = format!(
        "[{}] {:<8} {} left ({:.0}%)",
        status.at.with_timezone(&chrono::Local).format("%H:%M:%S"),
        status.mode.label(),
        status.remaining_clock(),
        status.progress_percent
    );
    if let Some(until) = status.snoozed_until {
        line.push_str(&format!(
            ", snoozed until {}",
            until.with_timezone(&chrono::Local).format("%H:%M")
        ));
    }
    line
}

fn cmd_set_paused(paused: bool) -> Result<()> {
    let mut config = load_config();
    config.paused = paused;
    config.save().context("could not save config")?;

    if paused {
        println!("Timer paused. Use 'restwatch resume' to continue.");
    } else {
        println!("Timer resumed.");
    }
    Ok(())
}

fn cmd_set(work: Option<&str>, break_minutes: Option<&str>) -> Result<()> {
    if work.is_none() && break_minutes.is_none() {
        bail!("nothing to change; pass --work and/or --break");
    }

    let mut config = load_config();
    let mut settings = config.break_settings();
    if let Some(input) = work {
        settings.work_minutes = BreakSettings::parse_minutes(DurationKind::Work, input)?;
    }
    if let Some(input) = break_minutes {
        settings.break_minutes = BreakSettings::parse_minutes(DurationKind::Break, input)?;
    }

    if settings == config.break_settings() {
        println!("Durations unchanged.");
        return Ok(());
    }

    config.work_minutes = settings.work_minutes;
    config.break_minutes = settings.break_minutes;
    config.save().context("could not save config")?;
    println!(
        "Work: {} min, break: {} min. A running timer restarts its current episode.",
        settings.work_minutes, settings.break_minutes
    );
    Ok(())
}

fn cmd_request(request: ControlRequest) -> Result<()> {
    let config = load_config();
    let message = ControlMessage::new(request, Utc::now());
    control::write_request(&config.control_path(), &message)
        .context("could not write control request")?;

    println!("Requested {request}. A running `restwatch start` applies it within a second.");
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = load_config();

    println!("restwatch Status");
    println!("================");
    println!();

    println!(
        "Input Monitoring Permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    match read_json::<Status>(&config.status_path()) {
        Some(status) => {
            let age = (Utc::now() - status.at).num_seconds();
            println!("Timer:");
            println!("  Mode: {}", status.mode);
            println!("  Remaining: {}", status.remaining_clock());
            println!("  Progress: {:.0}%", status.progress_percent);
            println!("  Active time: {}s", status.active_time);
            println!("  Idle for: {}s", status.idle_seconds);
            if let Some(until) = status.snoozed_until {
                println!(
                    "  Snoozed until: {}",
                    until.with_timezone(&chrono::Local).format("%H:%M:%S")
                );
            }
            if age > STATUS_STALE_SECS {
                println!("  (last updated {age}s ago; is `restwatch start` running?)");
            }
        }
        None => println!("Timer: not running"),
    }
    println!();

    println!("Configuration:");
    println!(
        "  Work: {} min, break: {} min",
        config.work_minutes, config.break_minutes
    );
    println!("  Paused: {}", config.paused);
    println!();

    if let Some(stats) = read_json::<SessionStats>(&config.session_path()) {
        println!("Last Session:");
        println!("  Signals: {}", stats.total_signals());
        println!("  Breaks completed: {}", stats.breaks_completed);
        println!();
    }

    let ledger = RewardLedger::load(&config.rewards_path()).unwrap_or_default();
    println!(
        "Points: {}, streak: {} day(s)",
        ledger.points, ledger.current_streak
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn cmd_rewards() -> Result<()> {
    let config = load_config();
    let ledger = RewardLedger::load(&config.rewards_path())?;
    println!("{}", ledger.summary());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
