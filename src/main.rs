use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod events;
mod services;
mod shell;
mod utils;

use config::{Config, LoggingConfig};
use services::{
    create_activity_monitor, create_presence_client, LabelResolver, LabelTable, LoopControl, PresenceReporter,
    Tracker, TrackerController, TrackerSettings,
};
use shell::{spawn_line_reader, Console, TableEditor};

#[derive(Parser, Debug)]
#[command(name = "activity-presence")]
#[command(about = "Shows the application you are using as your Discord status")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "presence.toml")]
    config: String,

    /// Sample and report against in-process fakes instead of the desktop and Discord
    #[arg(long)]
    dry_run: bool,

    /// Log filter, overrides `RUST_LOG` and `logging.level`
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// Connect and report the foreground application until Ctrl+C
    Run {
        /// Status prefix shown before the application name
        #[arg(long)]
        details: Option<String>,
    },
    /// Interactive console: connect, start, stop, set the message
    Console,
    /// Add or replace one entry in the label table
    Edit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let _log_guard = init_tracing(args.log_level.as_deref(), &config.logging)?;

    info!("Starting activity-presence v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", args.config);

    if args.dry_run {
        warn!("Dry run: no desktop queries, no Discord connection");
    }

    let mode = match args.mode.clone() {
        Some(mode) => mode,
        None => choose_mode()?,
    };

    match mode {
        Mode::Edit => run_editor(&config),
        Mode::Run { details } => run_tracker(&config, args.dry_run, details).await,
        Mode::Console => run_console(&config, args.dry_run).await,
    }
}

/// Startup question for bare invocations; anything but `1` starts tracking.
fn choose_mode() -> Result<Mode> {
    let stdin = std::io::stdin();
    let answer = utils::prompt_line(&mut stdin.lock(), &mut std::io::stdout(), "start or edit label table? (0/1): ")?;

    Ok(match answer.as_deref().map(str::trim) {
        Some("1") => Mode::Edit,
        _ => Mode::Run { details: None },
    })
}

fn run_editor(config: &Config) -> Result<()> {
    let stdin = std::io::stdin();
    let outcome = TableEditor::new(&config.labels.path).run(&mut stdin.lock(), &mut std::io::stdout())?;
    info!("Label table editor finished: {:?}", outcome);
    Ok(())
}

fn build_tracker(config: &Config, dry_run: bool) -> Result<Tracker> {
    let table = LabelTable::load(&config.labels.path)?;
    if table.is_empty() {
        warn!("Label table is empty, raw process names will be shown");
    } else {
        info!("Label table has {} entries", table.len());
    }

    let resolver = LabelResolver::new(Arc::new(table), config.labels.strip_suffixes.clone());
    let monitor = create_activity_monitor(config, dry_run)?;

    Ok(Tracker::new(monitor, resolver, TrackerSettings::from(&config.tracking)))
}

async fn run_tracker(config: &Config, dry_run: bool, details: Option<String>) -> Result<()> {
    let prefix = match details {
        Some(details) => details,
        None => {
            let stdin = std::io::stdin();
            let question = format!(
                "type details you want (if empty, defaults to '{}'): ",
                config.tracking.details_prefix
            );
            utils::prompt_line(&mut stdin.lock(), &mut std::io::stdout(), &question)?.unwrap_or_default()
        }
    };
    let prefix = match prefix.trim() {
        "" => config.tracking.details_prefix.clone(),
        text => text.to_string(),
    };

    let mut tracker = build_tracker(config, dry_run)?;
    let reporter = Mutex::new(PresenceReporter::new(create_presence_client(config, dry_run)));

    if !reporter.lock().await.connect().await {
        anyhow::bail!("Could not connect to Discord, make sure the desktop client is running");
    }

    let control = LoopControl::fixed(prefix);
    let result = tokio::select! {
        result = tracker.run(&reporter, &control) => result,
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl+C"),
                Err(err) => error!("Failed to wait for Ctrl+C: {}", err),
            }
            Ok(())
        }
    };

    info!("Shutting down...");
    reporter.lock().await.disconnect().await;

    result.context("Tracking loop failed")
}

async fn run_console(config: &Config, dry_run: bool) -> Result<()> {
    let tracker = build_tracker(config, dry_run)?;
    let reporter = PresenceReporter::new(create_presence_client(config, dry_run));
    let mut controller = TrackerController::new(tracker, reporter, config.tracking.details_prefix.clone());

    let input = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    let mut console = Console::new(&mut controller);
    let result = tokio::select! {
        result = console.run(input, tokio::io::stdout()) => result,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C");
            Ok(())
        }
    };

    // No-op when the console already shut down.
    controller.shutdown().await;
    result.context("Console failed")
}

/// `--log-level` wins, then `RUST_LOG`, then `logging.level`.
fn env_filter(flag: Option<&str>, configured: &str) -> Result<EnvFilter> {
    let filter = match flag {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("Invalid --log-level '{}'", level))?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(configured))?,
    };
    Ok(filter)
}

fn init_tracing(flag: Option<&str>, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = env_filter(flag, &logging.level)?;

    let (pretty, compact) = if logging.format == "pretty" {
        (Some(fmt::layer().pretty().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().compact().with_writer(std::io::stderr)))
    };

    let (file_layer, guard) = if logging.file.as_os_str().is_empty() {
        (None, None)
    } else {
        let dir = logging
            .file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = logging
            .file
            .file_name()
            .with_context(|| format!("logging.file {:?} has no file name", logging.file))?;
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {:?}", dir))?;

        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(compact)
        .with(file_layer)
        .init();

    Ok(guard)
}
