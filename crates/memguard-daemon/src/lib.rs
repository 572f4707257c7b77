//! memguard Daemon
//!
//! Configuration, alert delivery, the periodic watch loop and the interactive
//! cleanup session behind the `memguard` binary.

pub mod cleanup;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod messages;
pub mod notifier;

pub use cleanup::{parse_selection, CleanupController, CleanupSummary, Selection};
pub use config::{Config, DEFAULT_CONFIG_PATH};
pub use daemon::{Daemon, DaemonState};
pub use dispatcher::{AlertDispatcher, AlertSettings, CheckReport, DispatchResult};
pub use messages::{format_alert, AlertMessage, Language};
pub use notifier::{DesktopNotifier, Notification, NotificationChannel, NullChannel};
