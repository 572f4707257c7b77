use crate::dispatcher::{AlertDispatcher, CheckReport};
use crate::notifier::NotificationChannel;
use memguard_core::{AlertLevel, Clock, MemorySource, Result, SystemClock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Running,
    Stopped,
}

/// Periodic memory watcher.
///
/// Each tick samples, classifies and dispatches synchronously; the only
/// await point is the sleep between ticks, which races the cancel token.
pub struct Daemon<S: MemorySource, N: NotificationChannel, C: Clock = SystemClock> {
    source: S,
    dispatcher: AlertDispatcher<N, C>,
    interval: Duration,
    state: DaemonState,
    ticks: u64,
    status_line: bool,
}

impl<S: MemorySource, N: NotificationChannel, C: Clock> Daemon<S, N, C> {
    pub fn new(source: S, dispatcher: AlertDispatcher<N, C>, interval: Duration) -> Self {
        let status_line = dispatcher.settings().enable_console;
        Self {
            source,
            dispatcher,
            interval,
            state: DaemonState::Stopped,
            ticks: 0,
            status_line,
        }
    }

    /// Show or hide the one-line status printed for Normal ticks
    pub fn with_status_line(mut self, enabled: bool) -> Self {
        self.status_line = enabled;
        self
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn dispatcher(&self) -> &AlertDispatcher<N, C> {
        &self.dispatcher
    }

    /// One sample/classify/dispatch pass
    pub fn tick(&mut self) -> Result<CheckReport> {
        let report = self.dispatcher.check(&mut self.source)?;
        self.ticks += 1;

        if report.level == AlertLevel::Normal && self.status_line {
            print_status_line(&report);
        }

        Ok(report)
    }

    /// Run until `token` is cancelled or sampling fails.
    ///
    /// Returns the number of completed ticks. A cancel that arrives during a
    /// tick is honoured once that tick has dispatched.
    pub async fn run(&mut self, token: CancellationToken) -> Result<u64> {
        self.state = DaemonState::Running;
        info!(
            "Daemon loop started, checking every {}s",
            self.interval.as_secs_f64()
        );

        loop {
            if let Err(e) = self.tick() {
                self.state = DaemonState::Stopped;
                error!("Memory check failed, stopping daemon: {}", e);
                return Err(e);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Cancellation received");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state = DaemonState::Stopped;
        info!("Daemon loop stopped after {} checks", self.ticks);
        Ok(self.ticks)
    }
}

fn print_status_line(report: &CheckReport) {
    let term = console::Term::stdout();
    let line = format!(
        "{} [{}] 内存正常 / Memory Normal: {:.1}% (可用 / Available: {:.1} GB)",
        AlertLevel::Normal.icon(),
        chrono::Local::now().format("%H:%M:%S"),
        report.usage,
        report.available_gb
    );

    let written = if term.is_term() {
        term.clear_line().and_then(|_| term.write_str(&line))
    } else {
        term.write_line(&line)
    };

    if let Err(e) = written {
        debug!("Cannot write status line: {}", e);
    }
}
