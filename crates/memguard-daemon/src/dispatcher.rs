use crate::config::Config;
use crate::messages::{format_alert, truncate_chars, AlertMessage, Language};
use crate::notifier::{Notification, NotificationChannel};
use colored::*;
use memguard_core::{
    AlertLevel, Clock, MemorySnapshot, MemorySource, Result, SystemClock, Thresholds,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Output switches and limits for alert delivery
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    pub language: Language,
    pub enable_console: bool,
    pub enable_notifications: bool,
    pub cooldown: Duration,
    pub title_limit: usize,
    pub body_limit: usize,
    pub timeout: Duration,
    pub critical_timeout: Duration,
}

impl AlertSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            language: config.language,
            enable_console: config.enable_console,
            enable_notifications: config.enable_notifications,
            cooldown: config.notification_cooldown(),
            title_limit: config.notification.title_limit,
            body_limit: config.notification.body_limit,
            timeout: Duration::from_secs(config.notification.timeout_secs),
            critical_timeout: Duration::from_secs(config.notification.critical_timeout_secs),
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub console_emitted: bool,
    pub notification_emitted: bool,
    /// A failed send was reported on the console
    pub failure_printed: bool,
}

/// Outcome of one sample-classify-dispatch pass, also the `--json` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub usage: f64,
    pub available_gb: f64,
    pub total_gb: f64,
    pub used_gb: f64,
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
}

impl CheckReport {
    fn new(snapshot: &MemorySnapshot, level: AlertLevel, message: AlertMessage) -> Self {
        Self {
            usage: snapshot.used_percent,
            available_gb: snapshot.available_gb(),
            total_gb: snapshot.total_gb(),
            used_gb: snapshot.used_gb(),
            level,
            title: message.title,
            message: message.body,
        }
    }
}

/// Formats alerts, prints them, and sends rate-limited notifications.
///
/// Console output is never throttled. Notifications respect the cooldown,
/// measured on the injected clock from the last successful send.
pub struct AlertDispatcher<N: NotificationChannel, C: Clock = SystemClock> {
    thresholds: Thresholds,
    settings: AlertSettings,
    channel: N,
    clock: C,
    last_notification: Option<Instant>,
}

impl<N: NotificationChannel> AlertDispatcher<N, SystemClock> {
    /// Build from validated configuration with the real clock
    pub fn from_config(config: &Config, channel: N) -> Result<Self> {
        Ok(Self::new(
            config.thresholds()?,
            AlertSettings::from_config(config),
            channel,
            SystemClock,
        ))
    }
}

impl<N: NotificationChannel, C: Clock> AlertDispatcher<N, C> {
    pub fn new(thresholds: Thresholds, settings: AlertSettings, channel: N, clock: C) -> Self {
        Self {
            thresholds,
            settings,
            channel,
            clock,
            last_notification: None,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn last_notification(&self) -> Option<Instant> {
        self.last_notification
    }

    pub fn classify(&self, snapshot: &MemorySnapshot) -> AlertLevel {
        self.thresholds.classify(snapshot.used_percent)
    }

    pub fn format(&self, level: AlertLevel, snapshot: &MemorySnapshot) -> AlertMessage {
        format_alert(level, snapshot, self.settings.language)
    }

    /// Sample, classify and, for anything above Normal, dispatch.
    ///
    /// A sampling failure is returned as-is; no report is built from a
    /// bad reading.
    pub fn check<S: MemorySource + ?Sized>(&mut self, source: &mut S) -> Result<CheckReport> {
        let snapshot = source.sample()?;
        let level = self.classify(&snapshot);
        debug!(
            "Memory check: {:.1}% used, {:.1} GB available -> {}",
            snapshot.used_percent,
            snapshot.available_gb(),
            level
        );

        if level.is_elevated() {
            self.dispatch(level, &snapshot);
        }

        Ok(CheckReport::new(&snapshot, level, self.format(level, &snapshot)))
    }

    pub fn dispatch(&mut self, level: AlertLevel, snapshot: &MemorySnapshot) -> DispatchResult {
        let message = self.format(level, snapshot);

        let console_emitted = if self.settings.enable_console {
            print_alert(level, &message);
            true
        } else {
            false
        };

        let (notification_emitted, failure_printed) = match self.notify(level, &message) {
            Ok(sent) => (sent, false),
            Err(e) => {
                warn!("Notification error: {}", e);
                if self.settings.enable_console {
                    println!("{} {}", "Notification error:".yellow(), e);
                }
                (false, self.settings.enable_console)
            }
        };

        DispatchResult {
            console_emitted,
            notification_emitted,
            failure_printed,
        }
    }

    /// `Ok(false)` when skipped, `Err` when the channel rejected the send
    fn notify(&mut self, level: AlertLevel, message: &AlertMessage) -> Result<bool> {
        if !self.settings.enable_notifications {
            return Ok(false);
        }

        if !self.channel.is_available() {
            debug!("Notification channel unavailable, skipping desktop notification");
            return Ok(false);
        }

        let now = self.clock.now();
        if let Some(last) = self.last_notification {
            if now.saturating_duration_since(last) < self.settings.cooldown {
                debug!("Notification suppressed by cooldown");
                return Ok(false);
            }
        }

        let notification = Notification {
            title: truncate_chars(&message.title, self.settings.title_limit),
            body: truncate_chars(&message.body, self.settings.body_limit),
            timeout: if level == AlertLevel::Critical {
                self.settings.critical_timeout
            } else {
                self.settings.timeout
            },
            urgent: level == AlertLevel::Critical,
        };

        self.channel.send(&notification)?;
        info!("Desktop notification sent: {}", level);
        self.last_notification = Some(now);
        Ok(true)
    }
}

fn print_alert(level: AlertLevel, message: &AlertMessage) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let rule = "=".repeat(60);
    let header = format!("{} [{}] {}", level.icon(), timestamp, message.title);
    let header = match level {
        AlertLevel::Normal => header.green(),
        AlertLevel::Notice => header.yellow(),
        AlertLevel::Warning => header.truecolor(255, 165, 0).bold(),
        AlertLevel::Critical => header.red().bold(),
    };

    println!();
    println!("{}", rule);
    println!("{}", header);
    println!("{}", rule);
    println!("{}", message.body);
    println!("{}", rule);
    println!();
}
