use crate::config::{TimestampMode, TrackingConfig};
use crate::error::{PresenceError, Result};
use crate::events::{unix_timestamp, ActivityChange, ActivityInfo, PresenceUpdate};
use crate::services::activity_monitor::ActivityMonitor;
use crate::services::label_resolver::LabelResolver;
use crate::services::presence::PresenceReporter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub timestamp_mode: TimestampMode,
}

impl From<&TrackingConfig> for TrackerSettings {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
            timestamp_mode: config.timestamp_mode,
        }
    }
}

/// Result of one sample-compare-report iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Same raw label as the last successful report.
    Unchanged,
    Reported(String),
    /// The report failed; the label will be retried on the next sample.
    ReportFailed(String),
}

/// What the loop reads from its owner on every iteration.
///
/// `tracking` is written only by the owner and `message` has a single
/// sender, so the loop never needs more than an acquire load and a borrow.
pub struct LoopControl {
    tracking: Arc<AtomicBool>,
    message: watch::Receiver<String>,
    default_prefix: String,
}

impl LoopControl {
    pub fn new(tracking: Arc<AtomicBool>, message: watch::Receiver<String>, default_prefix: String) -> Self {
        Self {
            tracking,
            message,
            default_prefix,
        }
    }

    /// Tracking forever with a fixed prefix; stopped by dropping the loop future.
    pub fn fixed(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let (_tx, rx) = watch::channel(prefix.clone());
        Self::new(Arc::new(AtomicBool::new(true)), rx, prefix)
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Acquire)
    }

    /// Custom message if one is set, otherwise the default prefix.
    pub fn prefix(&self) -> String {
        let message = self.message.borrow().trim().to_string();
        if message.is_empty() {
            self.default_prefix.clone()
        } else {
            message
        }
    }
}

/// The change-detection loop: sample, resolve, report only when the raw label changed.
pub struct Tracker {
    monitor: Box<dyn ActivityMonitor + Send>,
    resolver: LabelResolver,
    settings: TrackerSettings,
    session_start: i64,
    last_reported: Option<String>,
    activity_tx: Option<watch::Sender<Option<ActivityChange>>>,
}

impl Tracker {
    pub fn new(monitor: Box<dyn ActivityMonitor + Send>, resolver: LabelResolver, settings: TrackerSettings) -> Self {
        Self {
            monitor,
            resolver,
            settings,
            session_start: unix_timestamp(),
            last_reported: None,
            activity_tx: None,
        }
    }

    /// Publishes every resolved activity, for front ends that display it.
    pub fn with_activity_sink(mut self, tx: watch::Sender<Option<ActivityChange>>) -> Self {
        self.activity_tx = Some(tx);
        self
    }

    /// Starts a new session: fresh start timestamp, nothing reported yet.
    pub fn reset(&mut self) {
        self.session_start = unix_timestamp();
        self.last_reported = None;
    }

    async fn sample(&mut self) -> Result<ActivityInfo> {
        match self.monitor.sample().await {
            Ok(activity) => Ok(activity),
            Err(PresenceError::NoActiveWindow) => {
                debug!("No foreground window, reporting as unknown");
                Ok(ActivityInfo::unknown())
            }
            Err(e) if e.is_recoverable() => {
                warn!("Activity query via {} failed: {}", self.monitor.name(), e);
                Ok(ActivityInfo::unknown())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn step(&mut self, reporter: &Mutex<PresenceReporter>, prefix: &str) -> Result<StepOutcome> {
        let activity = self.sample().await?;

        if self.last_reported.as_deref() == Some(activity.process_name.as_str()) {
            return Ok(StepOutcome::Unchanged);
        }

        let display_name = self.resolver.resolve(&activity.process_name);
        let start = match self.settings.timestamp_mode {
            TimestampMode::Session => self.session_start,
            TimestampMode::Activity => unix_timestamp(),
        };
        let update = PresenceUpdate::new(format!("{}: ", prefix), display_name.clone(), start)
            .with_pid(activity.pid);

        info!("Switching to: {} ({})", display_name, activity);
        if let Some(title) = &activity.title {
            debug!("Window title: {}", title);
        }
        let reported = reporter.lock().await.update(&update).await;

        if let Some(tx) = &self.activity_tx {
            tx.send_replace(Some(ActivityChange::new(activity.clone(), display_name.clone(), reported)));
        }

        if reported {
            self.last_reported = Some(activity.process_name);
            Ok(StepOutcome::Reported(display_name))
        } else {
            Ok(StepOutcome::ReportFailed(display_name))
        }
    }

    /// Runs until `control` stops tracking. The flag is checked at the top of
    /// each iteration; an update already in flight is not interrupted.
    pub async fn run(&mut self, reporter: &Mutex<PresenceReporter>, control: &LoopControl) -> Result<()> {
        info!(
            "Tracking started (every {:?}, session start {})",
            self.settings.poll_interval, self.session_start
        );

        while control.is_tracking() {
            let prefix = control.prefix();
            let pause = match self.step(reporter, &prefix).await {
                Ok(StepOutcome::ReportFailed(display_name)) => {
                    warn!(
                        "Could not report '{}', retrying in {:?}",
                        display_name, self.settings.error_backoff
                    );
                    self.settings.error_backoff
                }
                Ok(_) => self.settings.poll_interval,
                Err(e) => {
                    error!("Tracking loop stopped: {}", e);
                    return Err(e);
                }
            };
            tokio::time::sleep(pause).await;
        }

        info!("Tracking stopped");
        Ok(())
    }
}
