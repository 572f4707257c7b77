use memguard_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

const APP_NAME: &str = "Memory Guardian";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub timeout: Duration,
    pub urgent: bool,
}

/// Best-effort desktop notification sink
pub trait NotificationChannel {
    /// Whether a notification could be delivered at all
    fn is_available(&self) -> bool;

    fn send(&mut self, notification: &Notification) -> Result<()>;
}

impl<N: NotificationChannel + ?Sized> NotificationChannel for Box<N> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn send(&mut self, notification: &Notification) -> Result<()> {
        (**self).send(notification)
    }
}

/// Channel that drops everything; used when notifications are off
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChannel;

impl NotificationChannel for NullChannel {
    fn is_available(&self) -> bool {
        false
    }

    fn send(&mut self, _notification: &Notification) -> Result<()> {
        Err(Error::NotificationChannel(
            "no notification channel configured".to_string(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    NotifySend,
    OsaScript,
}

impl Backend {
    fn program(&self) -> &'static str {
        match self {
            Backend::NotifySend => "notify-send",
            Backend::OsaScript => "osascript",
        }
    }
}

/// Desktop notifications through the platform's command-line notifier:
/// `notify-send` on Linux/BSD, `osascript` on macOS.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    backend: Option<(Backend, PathBuf)>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        let backend = if cfg!(target_os = "macos") {
            Some(Backend::OsaScript)
        } else if cfg!(unix) {
            Some(Backend::NotifySend)
        } else {
            None
        };

        let backend = backend.and_then(|b| find_in_path(b.program()).map(|path| (b, path)));
        match &backend {
            Some((_, path)) => debug!("Desktop notifications via {}", path.display()),
            None => debug!("No desktop notification backend found"),
        }

        Self { backend }
    }

    fn command(backend: Backend, program: &Path, notification: &Notification) -> Command {
        let mut cmd = Command::new(program);
        match backend {
            Backend::NotifySend => {
                cmd.arg("--app-name")
                    .arg(APP_NAME)
                    .arg("--expire-time")
                    .arg(notification.timeout.as_millis().to_string())
                    .arg("--urgency")
                    .arg(if notification.urgent { "critical" } else { "normal" })
                    .arg(&notification.title)
                    .arg(&notification.body);
            }
            Backend::OsaScript => {
                let script = format!(
                    "display notification {} with title {}",
                    applescript_string(&notification.body),
                    applescript_string(&notification.title)
                );
                cmd.arg("-e").arg(script);
            }
        }
        cmd
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationChannel for DesktopNotifier {
    fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn send(&mut self, notification: &Notification) -> Result<()> {
        let (backend, program) = self.backend.as_ref().ok_or_else(|| {
            Error::NotificationChannel("no desktop notification backend".to_string())
        })?;

        let output = Self::command(*backend, program, notification)
            .output()
            .map_err(|e| {
                Error::NotificationChannel(format!("Failed to run {}: {}", backend.program(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::NotificationChannel(format!(
                "{} failed: {}",
                backend.program(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Quote `text` as an AppleScript string literal
fn applescript_string(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
