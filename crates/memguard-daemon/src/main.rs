use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use memguard_core::{
    AlertLevel, MemorySource, ProcessExecutor, ProcessScanner, SystemMemory, SystemProcessTable,
    VERSION,
};
use memguard_daemon::cleanup::is_confirmation;
use memguard_daemon::{
    AlertDispatcher, CheckReport, CleanupController, Config, Daemon, DesktopNotifier,
    NotificationChannel, NullChannel, DEFAULT_CONFIG_PATH,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// memguard - memory guardian for development machines
///
/// Warns before physical memory runs out and helps clean up runaway
/// Python and Node.js processes.
#[derive(Parser, Debug)]
#[command(name = "memguard")]
#[command(version = VERSION)]
#[command(about = "Memory guardian - alerts on memory pressure and cleans up runaway processes", long_about = None)]
struct Cli {
    /// Run a single check and exit
    #[arg(short, long)]
    check: bool,

    /// Keep checking every `check_interval` seconds until stopped
    #[arg(short, long, conflicts_with_all = ["check", "cleanup"])]
    daemon: bool,

    /// Path to configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the check result as JSON (implies --check)
    #[arg(long, conflicts_with_all = ["daemon", "cleanup"])]
    json: bool,

    /// Go straight to the interactive process cleanup
    #[arg(long, conflicts_with = "check")]
    cleanup: bool,

    /// Write the default configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in DIR
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.daemon, cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => return fatal(&e),
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fatal(&e),
    }
}

fn fatal(e: &anyhow::Error) -> ExitCode {
    error!("{:#}", e);
    eprintln!("{} {:#}", "错误 / Error:".red().bold(), e);
    ExitCode::FAILURE
}

fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.generate_config {
        return generate_config(path);
    }

    let mut config = Config::load_or_default(&cli.config);
    if cli.json {
        // stdout carries only the JSON document
        config.enable_console = false;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    let mut source = SystemMemory::new().context("Cannot read system memory")?;

    if cli.daemon {
        return run_daemon(&config, source);
    }

    if cli.cleanup {
        return run_cleanup(&config, &mut source);
    }

    let mut dispatcher = AlertDispatcher::from_config(&config, notification_channel(&config))?;
    let report = dispatcher.check(&mut source).context("Memory check failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);

    if !cli.check && report.level >= AlertLevel::Warning {
        print!(
            "\n{} ",
            "是否清理 Python/Node.js 进程? [y/N] / Clean up Python/Node.js processes? [y/N]"
                .bold()
        );
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if is_confirmation(&answer) {
            run_cleanup(&config, &mut source)?;
        }
    }

    Ok(())
}

fn notification_channel(config: &Config) -> Box<dyn NotificationChannel> {
    if config.enable_notifications {
        Box::new(DesktopNotifier::new())
    } else {
        Box::new(NullChannel)
    }
}

fn print_report(report: &CheckReport) {
    let line = format!(
        "{} 内存使用率 / Memory usage: {:.1}% | 已用 / Used: {:.1} GB | 可用 / Available: {:.1} GB | 总计 / Total: {:.1} GB",
        report.level.icon(),
        report.usage,
        report.used_gb,
        report.available_gb,
        report.total_gb
    );
    let line = match report.level {
        AlertLevel::Normal => line.green(),
        AlertLevel::Notice => line.yellow(),
        AlertLevel::Warning => line.truecolor(255, 165, 0),
        AlertLevel::Critical => line.red().bold(),
    };
    println!("{}", line);
}

/// Interactive cleanup on the real process table, then report memory again
fn run_cleanup(config: &Config, source: &mut SystemMemory) -> Result<()> {
    let mut controller = CleanupController::new(
        SystemProcessTable::new(),
        ProcessScanner::new(config.target_processes.iter().cloned()),
        ProcessExecutor::new(),
        config.language,
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let summary = controller
        .run(&mut stdin.lock(), &mut stdout.lock())
        .context("Cleanup failed")?;

    if let Some(summary) = summary.filter(|s| s.succeeded > 0) {
        info!(
            "Cleanup terminated {} of {} selected processes",
            summary.succeeded, summary.selected
        );

        // Give the kernel a moment to reclaim the freed pages
        std::thread::sleep(Duration::from_secs(1));
        let after = source.sample().context("Memory check failed")?;
        println!(
            "📊 当前内存使用率 / Memory usage now: {:.1}% | 可用 / Available: {:.1} GB",
            after.used_percent,
            after.available_gb()
        );
    }

    Ok(())
}

fn run_daemon(config: &Config, source: SystemMemory) -> Result<()> {
    let dispatcher = AlertDispatcher::from_config(config, notification_channel(config))?;
    let mut daemon = Daemon::new(source, dispatcher, config.check_interval());

    print_banner(config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let ticks = runtime.block_on(async {
        let token = CancellationToken::new();
        let shutdown = token.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            shutdown.cancel();
        });

        daemon.run(token).await
    });

    println!("\n👋 内存守护已停止 / Memory Guardian stopped");
    let ticks = ticks.context("Daemon stopped on error")?;
    info!("Daemon exited cleanly after {} checks", ticks);
    Ok(())
}

fn print_banner(config: &Config) {
    let rule = "=".repeat(60);
    println!("{}", rule);
    println!("{}", "🛡️  内存守护已启动 / Memory Guardian started".bold());
    println!(
        "检查间隔 / Check interval: {}",
        humantime::format_duration(config.check_interval())
    );
    println!(
        "阈值 / Thresholds: 提醒/Notice {}% | 警告/Warning {}% | 严重/Critical {}%",
        config.thresholds.notice, config.thresholds.warning, config.thresholds.critical
    );
    println!("按 Ctrl+C 停止 / Press Ctrl+C to stop");
    println!("{}", rule);
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, stopping"),
                _ = terminate.recv() => info!("Received SIGTERM, stopping"),
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn generate_config(path: &Path) -> Result<()> {
    Config::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))?;

    println!("Configuration written to {}", path.display());
    Ok(())
}

/// stderr logging filtered by RUST_LOG, plus an optional daily log file.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(daemon: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if daemon { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "memguard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(guard)
}
