use crate::errors::{AppError, AppResult};
use crate::export::ReportColumn;
use crate::utils::zone::DisplayZone;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    #[serde(default = "default_display_timezone")]
    pub display_timezone: String,
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    #[serde(default = "default_resync_lookback_days")]
    pub resync_lookback_days: i64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_export_columns")]
    pub export_columns: Vec<ReportColumn>,
}

/// Upper bound for `resync_lookback_days` (about a century).
const MAX_RESYNC_LOOKBACK_DAYS: i64 = 36_500;

fn default_display_timezone() -> String {
    "local".to_string()
}
fn default_tick_seconds() -> u64 {
    1
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_feed_capacity() -> usize {
    256
}
fn default_resync_lookback_days() -> i64 {
    7
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_export_columns() -> Vec<ReportColumn> {
    ReportColumn::default_set()
}

impl Default for Config {
    fn default() -> Self {
        Self::with_database(Self::database_file())
    }
}

impl Config {
    fn with_database(db_path: PathBuf) -> Self {
        Self {
            database: db_path.to_string_lossy().to_string(),
            display_timezone: default_display_timezone(),
            tick_seconds: default_tick_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            feed_capacity: default_feed_capacity(),
            resync_lookback_days: default_resync_lookback_days(),
            log_level: default_log_level(),
            export_columns: default_export_columns(),
        }
    }

    /// Return the standard configuration directory (`~/.rbreaktracker`)
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rbreaktracker")
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("rbreaktracker.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("rbreaktracker.sqlite")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        let path = Self::config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> AppResult<Self> {
        let cfg: Config = serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("invalid configuration file: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.display_zone()?;
        if self.tick_seconds == 0 {
            return Err(AppError::Config("tick_seconds must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be at least 1".into()));
        }
        if !(0..=MAX_RESYNC_LOOKBACK_DAYS).contains(&self.resync_lookback_days) {
            return Err(AppError::Config(format!(
                "resync_lookback_days must be between 0 and {}",
                MAX_RESYNC_LOOKBACK_DAYS
            )));
        }
        if self.export_columns.is_empty() {
            return Err(AppError::Config("export_columns must not be empty".into()));
        }
        Ok(())
    }

    pub fn display_zone(&self) -> AppResult<DisplayZone> {
        DisplayZone::parse(&self.display_timezone)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Lower bound of the window a session keeps synced.
    pub fn resync_since(&self, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        TimeDelta::try_days(self.resync_lookback_days)
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "resync_lookback_days {} is out of range",
                    self.resync_lookback_days
                ))
            })
    }

    /// Initialize configuration and database files.
    /// Returns the configuration that was written (or would have been, in test mode).
    pub fn init_all(custom_db: Option<String>, is_test: bool) -> AppResult<Self> {
        let dir = Self::config_dir();

        let db_path = match custom_db {
            Some(name) => {
                let p = PathBuf::from(name);
                if p.is_absolute() { p } else { dir.join(p) }
            }
            None => Self::database_file(),
        };

        let config = Self::with_database(db_path);

        if !is_test {
            fs::create_dir_all(&dir)?;
            let yaml = serde_yaml::to_string(&config)?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
        }

        if let Some(parent) = PathBuf::from(&config.database).parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        Ok(config)
    }
}
