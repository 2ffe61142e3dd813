//! Configuration management for seat-killer
//!
//! This module handles loading and validating the TOML configuration: the
//! credentials, the global preemption lead, scheduler tunables, HTTP client
//! endpoints and one optional booking task per weekday.

use chrono::{DateTime, Days, Local, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::{ErrorCategory, SeatErrorTrait};
use crate::utils::local_instant;
use crate::utils::retry::RetryConfig;

/// Earliest hour a reservation may start
pub const OPENING_HOUR: u32 = 7;

/// Hour by which every reservation must have ended
pub const CLOSING_HOUR: u32 = 22;

/// Largest accepted preemption lead, in seconds
pub const MAX_PREEMPT_SECONDS: u32 = 300;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("No credentials configured (set [credentials] or SEAT_KILLER_SCHOOL_ID/SEAT_KILLER_PASSWORD)")]
    MissingCredentials,
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl SeatErrorTrait for ConfigError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Login identity; may also come from a separate file or the environment
    #[serde(default)]
    pub credentials: Option<Credentials>,

    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    /// One optional task per weekday
    #[serde(default)]
    pub week: WeekConfig,

    /// Task used by the `check` command to probe the booking API
    #[serde(default)]
    pub probe: Option<DayTask>,
}

/// Account used for single sign-on
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub school_id: String,
    pub password: String,
}

impl Credentials {
    pub fn new(school_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            school_id: school_id.into(),
            password: password.into(),
        }
    }

    /// Load credentials from a standalone TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("school_id", &self.school_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings shared by every task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Seconds before the release instant to start firing requests
    pub preempt_seconds: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            preempt_seconds: 15,
        }
    }
}

impl GlobalConfig {
    pub fn preempt_lead(&self) -> Duration {
        Duration::from_secs(u64::from(self.preempt_seconds))
    }
}

/// Timing and retry tunables for the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval of the polling clock inside a phase
    pub request_interval_ms: u64,

    /// Grace period after the release instant covered by the fallback phase
    pub fallback_window_secs: u64,

    /// Immediate attempts per seat per tick
    pub booking_attempts: u32,
    pub booking_retry_delay_ms: u64,

    /// Credential check before waiting for the window
    pub validation_attempts: u32,
    pub validation_retry_delay_secs: u64,

    /// Real login once the window opens
    pub login_attempts: u32,
    pub login_retry_delay_secs: u64,

    /// How many days ahead reservations are made
    pub advance_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_interval_ms: 500,
            fallback_window_secs: crate::scheduler::DEFAULT_FALLBACK_WINDOW.as_secs(),
            booking_attempts: 2,
            booking_retry_delay_ms: 100,
            validation_attempts: 3,
            validation_retry_delay_secs: 2,
            login_attempts: 20,
            login_retry_delay_secs: 3,
            advance_days: 2,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn fallback_window(&self) -> Duration {
        Duration::from_secs(self.fallback_window_secs)
    }

    pub fn booking_retry(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.booking_attempts,
            Duration::from_millis(self.booking_retry_delay_ms),
        )
    }

    pub fn validation_retry(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.validation_attempts,
            Duration::from_secs(self.validation_retry_delay_secs),
        )
    }

    pub fn login_retry(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.login_attempts,
            Duration::from_secs(self.login_retry_delay_secs),
        )
    }
}

/// HTTP endpoints and client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// CAS login URL, including the `service` parameter pointing back at the library
    pub sso_login_url: String,

    /// Base URL of the seat reservation site
    pub library_base_url: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sso_login_url: String::from(
                "https://sso.hdu.edu.cn/login?service=https:%2F%2Fhdu.huitu.zhishulib.com%2FUser%2FIndex%2FhduCASLogin%3Fforward%3D%252FSpace%252FCategory%252Fredirect%253Fcategory_id%253D591",
            ),
            library_base_url: String::from("https://hdu.huitu.zhishulib.com"),
            request_timeout_secs: 10,
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36 Edg/142.0.0.0",
            ),
        }
    }
}

impl ClientConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Weekday table; keys accept English names or the Chinese weekday names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekConfig {
    #[serde(default, alias = "周一")]
    pub monday: Option<DayTask>,
    #[serde(default, alias = "周二")]
    pub tuesday: Option<DayTask>,
    #[serde(default, alias = "周三")]
    pub wednesday: Option<DayTask>,
    #[serde(default, alias = "周四")]
    pub thursday: Option<DayTask>,
    #[serde(default, alias = "周五")]
    pub friday: Option<DayTask>,
    #[serde(default, alias = "周六")]
    pub saturday: Option<DayTask>,
    #[serde(default, alias = "周日")]
    pub sunday: Option<DayTask>,
}

impl WeekConfig {
    pub fn get(&self, weekday: Weekday) -> Option<&DayTask> {
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }

    /// Configured days in calendar order
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &DayTask)> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter_map(move |day| self.get(day).map(|task| (day, task)))
    }
}

/// A single day's booking task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayTask {
    #[serde(default, alias = "启用")]
    pub enable: bool,

    /// Release instant, local time
    pub run_at_hour: u32,
    #[serde(default)]
    pub run_at_minute: u32,

    /// Room name, as it appears in the seat map
    pub name: String,

    /// Seat labels in priority order
    #[serde(default)]
    pub seats: Vec<String>,

    /// Hour the reserved slot begins
    pub book_start_hour: u32,

    /// Length of the reserved slot, in hours
    pub duration: u32,
}

impl DayTask {
    /// Validate one task, `label` names it in error messages
    pub fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if self.run_at_hour > 23 {
            return Err(ConfigError::invalid(
                format!("{label}.run_at_hour"),
                format!("{} must be within 0-23", self.run_at_hour),
            ));
        }

        if self.run_at_minute > 59 {
            return Err(ConfigError::invalid(
                format!("{label}.run_at_minute"),
                format!("{} must be within 0-59", self.run_at_minute),
            ));
        }

        if !(OPENING_HOUR..=CLOSING_HOUR).contains(&self.book_start_hour) {
            return Err(ConfigError::invalid(
                format!("{label}.book_start_hour"),
                format!(
                    "{} must be within {OPENING_HOUR}-{CLOSING_HOUR}",
                    self.book_start_hour
                ),
            ));
        }

        if self.duration == 0 {
            return Err(ConfigError::invalid(
                format!("{label}.duration"),
                "must be at least one hour",
            ));
        }

        let end_hour = u64::from(self.book_start_hour) + u64::from(self.duration);
        if end_hour > u64::from(CLOSING_HOUR) {
            return Err(ConfigError::invalid(
                format!("{label}.duration"),
                format!("book_start_hour + duration = {end_hour} exceeds closing hour {CLOSING_HOUR}"),
            ));
        }

        if self.enable && self.seats.is_empty() {
            return Err(ConfigError::invalid(
                format!("{label}.seats"),
                "an enabled task needs at least one seat",
            ));
        }

        Ok(())
    }

    /// Start of the reserved slot, `advance_days` after `today`
    pub fn reservation_start(&self, today: DateTime<Local>, advance_days: u32) -> DateTime<Local> {
        let date = today
            .date_naive()
            .checked_add_days(Days::new(u64::from(advance_days)))
            .unwrap_or_else(|| today.date_naive());
        let time = NaiveTime::from_hms_opt(self.book_start_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        local_instant(date.and_time(time))
    }

    /// Length of the reserved slot
    pub fn reservation_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration) * 3600)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Load the main file, an optional credentials file, then apply environment overrides
    pub fn load(path: &Path, credentials_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;

        if let Some(credentials_path) = credentials_path {
            config.credentials = Some(Credentials::from_file(credentials_path)?);
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override credentials from `SEAT_KILLER_SCHOOL_ID` / `SEAT_KILLER_PASSWORD`
    pub fn apply_env_overrides(&mut self) {
        let school_id = std::env::var("SEAT_KILLER_SCHOOL_ID").ok();
        let password = std::env::var("SEAT_KILLER_PASSWORD").ok();

        match (school_id, password) {
            (Some(school_id), Some(password)) => {
                self.credentials = Some(Credentials::new(school_id, password));
            }
            (Some(school_id), None) => {
                if let Some(creds) = self.credentials.as_mut() {
                    creds.school_id = school_id;
                }
            }
            (None, Some(password)) => {
                if let Some(creds) = self.credentials.as_mut() {
                    creds.password = password;
                }
            }
            (None, None) => {}
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.preempt_seconds > MAX_PREEMPT_SECONDS {
            return Err(ConfigError::invalid(
                "global.preempt_seconds",
                format!("{} exceeds {MAX_PREEMPT_SECONDS}", self.global.preempt_seconds),
            ));
        }

        if self.scheduler.request_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "scheduler.request_interval_ms",
                "must be greater than 0",
            ));
        }

        if self.scheduler.booking_attempts == 0 || self.scheduler.login_attempts == 0 {
            return Err(ConfigError::invalid(
                "scheduler",
                "attempt budgets must be at least 1",
            ));
        }

        if let Some(creds) = &self.credentials {
            if creds.school_id.trim().is_empty() {
                return Err(ConfigError::invalid("credentials.school_id", "must not be empty"));
            }
        }

        for (day, task) in self.week.iter() {
            task.validate(&format!("week.{}", weekday_key(day)))?;
        }

        if let Some(probe) = &self.probe {
            probe.validate("probe")?;
        }

        Ok(())
    }

    /// Credentials, or an error when none were configured
    pub fn credentials(&self) -> Result<&Credentials, ConfigError> {
        self.credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredentials)
    }

    /// The enabled task with at least one seat for `weekday`
    pub fn today_task(&self, weekday: Weekday) -> Option<&DayTask> {
        self.week
            .get(weekday)
            .filter(|task| task.enable && !task.seats.is_empty())
    }
}

/// Config key used for a weekday
pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
