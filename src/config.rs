//! Configuration for restwatch.
//!
//! [`Config`] is the on-disk file the CLI edits and the running engine
//! re-reads. [`EngineSettings`] is the value the engine is constructed with,
//! and [`BreakSettings`] holds the two durations that can change live.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Allowed work duration, in minutes.
pub const WORK_MINUTES_RANGE: RangeInclusive<u32> = 15..=90;
/// Allowed break duration, in minutes.
pub const BREAK_MINUTES_RANGE: RangeInclusive<u32> = 1..=15;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(30);
pub const DEFAULT_SCREEN_CHECK_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_WINDOW_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SNOOZE_DURATION: Duration = Duration::from_secs(300);
pub const DEFAULT_SCREEN_CHANGE_THRESHOLD: f64 = 100.0;

/// Upper bound for the idle threshold and snooze duration.
pub const MAX_HOLD_DURATION: Duration = Duration::from_secs(60 * 60);

/// Which of the two live durations a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationKind {
    Work,
    Break,
}

impl DurationKind {
    pub fn range(&self) -> RangeInclusive<u32> {
        match self {
            DurationKind::Work => WORK_MINUTES_RANGE,
            DurationKind::Break => BREAK_MINUTES_RANGE,
        }
    }

    /// Check that `minutes` is inside this kind's bounds.
    pub fn validate(&self, minutes: u32) -> Result<u32, ConfigError> {
        let range = self.range();
        if range.contains(&minutes) {
            Ok(minutes)
        } else {
            Err(ConfigError::InvalidDuration {
                kind: *self,
                value: minutes,
                min: *range.start(),
                max: *range.end(),
            })
        }
    }
}

impl fmt::Display for DurationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationKind::Work => write!(f, "work duration"),
            DurationKind::Break => write!(f, "break duration"),
        }
    }
}

/// Work and break durations, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakSettings {
    pub work_minutes: u32,
    pub break_minutes: u32,
}

impl Default for BreakSettings {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
        }
    }
}

impl BreakSettings {
    /// Build validated settings.
    pub fn new(work_minutes: u32, break_minutes: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            work_minutes: DurationKind::Work.validate(work_minutes)?,
            break_minutes: DurationKind::Break.validate(break_minutes)?,
        })
    }

    /// Parse user input such as a form field or CLI argument.
    pub fn parse_minutes(kind: DurationKind, input: &str) -> Result<u32, ConfigError> {
        let minutes = input
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::NotANumber {
                kind,
                input: input.to_string(),
            })?;
        kind.validate(minutes)
    }

    pub fn work_secs(&self) -> u64 {
        u64::from(self.work_minutes) * 60
    }

    pub fn break_secs(&self) -> u64 {
        u64::from(self.break_minutes) * 60
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        DurationKind::Work.validate(self.work_minutes)?;
        DurationKind::Break.validate(self.break_minutes)?;
        Ok(())
    }
}

/// Everything the engine needs at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Gap since the last signal after which the user counts as idle
    pub idle_threshold: Duration,
    /// How long a snooze suspends accumulation
    pub snooze_duration: Duration,
    /// Interval between screen samples
    pub screen_check_interval: Duration,
    /// Interval between foreground-window polls
    pub window_poll_interval: Duration,
    /// Change score above which a screen sample counts as activity
    pub screen_change_threshold: f64,
    /// Initial durations
    pub breaks: BreakSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            snooze_duration: DEFAULT_SNOOZE_DURATION,
            screen_check_interval: DEFAULT_SCREEN_CHECK_INTERVAL,
            window_poll_interval: DEFAULT_WINDOW_POLL_INTERVAL,
            screen_change_threshold: DEFAULT_SCREEN_CHANGE_THRESHOLD,
            breaks: BreakSettings::default(),
        }
    }
}

/// Main configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active minutes before a break is due
    pub work_minutes: u32,

    /// Length of a break in minutes
    pub break_minutes: u32,

    /// Seconds without any signal before the user counts as idle
    #[serde(with = "duration_serde")]
    pub idle_threshold: Duration,

    /// Seconds between screen samples
    #[serde(with = "duration_serde")]
    pub screen_check_interval: Duration,

    /// Seconds between foreground-window polls
    #[serde(with = "duration_serde")]
    pub window_poll_interval: Duration,

    /// Seconds a snooze holds the work timer
    #[serde(with = "duration_serde")]
    pub snooze_duration: Duration,

    /// Screen change score that counts as activity
    pub screen_change_threshold: f64,

    /// Which probes to run
    pub probes: ProbeConfig,

    /// Optional commands run on break transitions
    pub alerts: AlertConfig,

    /// Whether the timer is paused
    pub paused: bool,

    /// Path for status, rewards and control files
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("restwatch");

        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            screen_check_interval: DEFAULT_SCREEN_CHECK_INTERVAL,
            window_poll_interval: DEFAULT_WINDOW_POLL_INTERVAL,
            snooze_duration: DEFAULT_SNOOZE_DURATION,
            screen_change_threshold: DEFAULT_SCREEN_CHANGE_THRESHOLD,
            probes: ProbeConfig::default(),
            alerts: AlertConfig::default(),
            paused: false,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file. A missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("restwatch")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.break_settings().validate()?;

        for (name, value) in [
            ("idle_threshold", self.idle_threshold),
            ("screen_check_interval", self.screen_check_interval),
            ("window_poll_interval", self.window_poll_interval),
            ("snooze_duration", self.snooze_duration),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        for (name, value) in [
            ("idle_threshold", self.idle_threshold),
            ("snooze_duration", self.snooze_duration),
        ] {
            if value > MAX_HOLD_DURATION {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most {} seconds",
                    MAX_HOLD_DURATION.as_secs()
                )));
            }
        }
        Ok(())
    }

    pub fn break_settings(&self) -> BreakSettings {
        BreakSettings {
            work_minutes: self.work_minutes,
            break_minutes: self.break_minutes,
        }
    }

    /// Settings the engine is constructed with.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            idle_threshold: self.idle_threshold,
            snooze_duration: self.snooze_duration,
            screen_check_interval: self.screen_check_interval,
            window_poll_interval: self.window_poll_interval,
            screen_change_threshold: self.screen_change_threshold,
            breaks: self.break_settings(),
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_path.join("status.json")
    }

    pub fn rewards_path(&self) -> PathBuf {
        self.data_path.join("rewards.json")
    }

    pub fn control_path(&self) -> PathBuf {
        self.data_path.join("control.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_path.join("session.json")
    }
}

/// Which probes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub input: bool,
    pub window: bool,
    pub screen: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            input: true,
            window: true,
            screen: true,
        }
    }
}

impl ProbeConfig {
    /// Check if at least one probe is enabled.
    pub fn any_enabled(&self) -> bool {
        self.input || self.window || self.screen
    }
}

/// Shell commands run when a break starts or ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub on_break_start: Option<String>,
    pub on_break_end: Option<String>,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    NotANumber {
        kind: DurationKind,
        input: String,
    },
    InvalidDuration {
        kind: DurationKind,
        value: u32,
        min: u32,
        max: u32,
    },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::NotANumber { kind, input } => {
                write!(f, "Invalid {kind}: {input:?} is not a whole number of minutes")
            }
            ConfigError::InvalidDuration {
                kind,
                value,
                min,
                max,
            } => write!(
                f,
                "Invalid {kind}: {value} minutes (must be between {min} and {max})"
            ),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.work_minutes, 25);
        assert_eq!(config.break_minutes, 5);
        assert_eq!(config.idle_threshold, Duration::from_secs(30));
        assert_eq!(config.screen_check_interval, Duration::from_secs(15));
        assert!(config.probes.any_enabled());
        assert!(!config.paused);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_settings_defaults_match_config() {
        assert_eq!(Config::default().engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_duration_bounds() {
        assert!(BreakSettings::new(15, 1).is_ok());
        assert!(BreakSettings::new(90, 15).is_ok());
        assert_eq!(
            BreakSettings::new(14, 5),
            Err(ConfigError::InvalidDuration {
                kind: DurationKind::Work,
                value: 14,
                min: 15,
                max: 90
            })
        );
        assert!(BreakSettings::new(25, 0).is_err());
        assert!(BreakSettings::new(25, 16).is_err());
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(BreakSettings::parse_minutes(DurationKind::Work, " 45 "), Ok(45));
        assert!(matches!(
            BreakSettings::parse_minutes(DurationKind::Break, "five"),
            Err(ConfigError::NotANumber { .. })
        ));
        assert!(matches!(
            BreakSettings::parse_minutes(DurationKind::Break, "-3"),
            Err(ConfigError::NotANumber { .. })
        ));
        assert!(matches!(
            BreakSettings::parse_minutes(DurationKind::Work, "120"),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let config = Config {
            idle_threshold: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_holds() {
        let config = Config {
            snooze_duration: Duration::from_secs(10_000_000_000_000),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            idle_threshold: MAX_HOLD_DURATION + Duration::from_secs(1),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            snooze_duration: MAX_HOLD_DURATION,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restwatch").join("config.json");

        let config = Config {
            work_minutes: 50,
            paused: true,
            probes: ProbeConfig {
                screen: false,
                ..ProbeConfig::default()
            },
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"work_minutes": 40, "idle_threshold": 60}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.work_minutes, 40);
        assert_eq!(loaded.break_minutes, DEFAULT_BREAK_MINUTES);
        assert_eq!(loaded.idle_threshold, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
