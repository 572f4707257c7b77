use crate::messages::Language;
use memguard_core::{Error, Result, Thresholds};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "memguard.toml";

/// Main configuration for the memory guardian.
///
/// Every key is optional in the file; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between daemon checks (default: 30)
    pub check_interval: u64,

    /// Minimum seconds between two desktop notifications (default: 60)
    pub notification_cooldown: u64,

    /// Case-insensitive name substrings of cleanable processes
    pub target_processes: Vec<String>,

    /// Send desktop notifications (default: true)
    pub enable_notifications: bool,

    /// Print alerts to the console (default: true)
    pub enable_console: bool,

    /// zh, en or bilingual (default: bilingual)
    pub language: Language,

    /// Usage thresholds in percent
    pub thresholds: ThresholdConfig,

    /// Desktop notification limits
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub notice: f64,
    pub warning: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Max title length in characters (default: 64)
    pub title_limit: usize,

    /// Max body length in characters (default: 256)
    pub body_limit: usize,

    /// Seconds a notice/warning notification stays visible (default: 10)
    pub timeout_secs: u64,

    /// Seconds a critical notification stays visible (default: 30)
    pub critical_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: 30,
            notification_cooldown: 60,
            target_processes: [
                "python",
                "python3",
                "python.exe",
                "pythonw.exe",
                "node",
                "node.exe",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            enable_notifications: true,
            enable_console: true,
            language: Language::Bilingual,
            thresholds: ThresholdConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            notice: 70.0,
            warning: 80.0,
            critical: 90.0,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title_limit: 64,
            body_limit: 256,
            timeout_secs: 10,
            critical_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use memguard_daemon::config::Config;
    ///
    /// let config = Config::load_from_file("memguard.toml").unwrap();
    /// println!("Critical threshold: {}", config.thresholds.critical);
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("cannot read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Load from `path`, falling back to defaults if the file is missing or
    /// unparseable. Never fails; validation is a separate step.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(
                "Configuration file not found: {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => {
                info!("Configuration loaded from: {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using default configuration", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("cannot serialize configuration: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// Thresholds must be strictly increasing within 0-100, the check
    /// interval and notification limits must be non-zero.
    pub fn validate(&self) -> Result<()> {
        self.thresholds()?;

        if self.check_interval == 0 {
            return Err(Error::InvalidConfig(
                "check_interval must be > 0".to_string(),
            ));
        }

        if self.notification.title_limit == 0 || self.notification.body_limit == 0 {
            return Err(Error::InvalidConfig(
                "notification title_limit and body_limit must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::new(
            self.thresholds.notice,
            self.thresholds.warning,
            self.thresholds.critical,
        )
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn notification_cooldown(&self) -> Duration {
        Duration::from_secs(self.notification_cooldown)
    }
}
