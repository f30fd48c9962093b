use crate::error::Result;
use crate::events::ActivityChange;
use crate::services::presence::PresenceReporter;
use crate::services::tracker::{LoopControl, Tracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Snapshot for a front end to render.
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    pub connected: bool,
    pub tracking: bool,
    pub message: String,
    pub current: Option<ActivityChange>,
}

/// Why `start_tracking` did not start anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefused {
    NotConnected,
    /// A previous worker panicked and took the tracker with it.
    Unavailable,
}

/// Runs the tracker on a background task while a front end owns the foreground.
///
/// Shared state: `tracking` is only written here and read by the worker,
/// the custom message flows front end -> worker over a watch channel, the
/// current activity flows worker -> front end over another one. The reporter
/// sits behind an async mutex so connect/disconnect and updates never overlap.
pub struct TrackerController {
    reporter: Arc<Mutex<PresenceReporter>>,
    tracking: Arc<AtomicBool>,
    message_tx: watch::Sender<String>,
    activity_rx: watch::Receiver<Option<ActivityChange>>,
    default_prefix: String,
    idle: Option<Tracker>,
    worker: Option<JoinHandle<(Tracker, Result<()>)>>,
}

impl TrackerController {
    pub fn new(tracker: Tracker, reporter: PresenceReporter, default_prefix: impl Into<String>) -> Self {
        let (activity_tx, activity_rx) = watch::channel(None);
        let (message_tx, _) = watch::channel(String::new());

        Self {
            reporter: Arc::new(Mutex::new(reporter)),
            tracking: Arc::new(AtomicBool::new(false)),
            message_tx,
            activity_rx,
            default_prefix: default_prefix.into(),
            idle: Some(tracker.with_activity_sink(activity_tx)),
            worker: None,
        }
    }

    pub async fn connect(&self) -> bool {
        self.reporter.lock().await.connect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.reporter.lock().await.is_connected()
    }

    /// Stops tracking first; a worker left running would only log "not connected".
    pub async fn disconnect(&mut self) {
        self.stop_tracking().await;
        self.reporter.lock().await.disconnect().await;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Acquire)
            && self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    pub async fn start_tracking(&mut self) -> std::result::Result<(), StartRefused> {
        if !self.is_connected().await {
            warn!("Please connect to Discord first");
            return Err(StartRefused::NotConnected);
        }
        if self.is_tracking() {
            return Ok(());
        }

        // A worker that already exited (or was told to stop) hands its tracker back.
        self.reclaim_worker().await;
        let Some(mut tracker) = self.idle.take() else {
            error!("Tracker is not available, cannot start");
            return Err(StartRefused::Unavailable);
        };
        tracker.reset();

        self.tracking.store(true, Ordering::Release);
        let control = LoopControl::new(
            self.tracking.clone(),
            self.message_tx.subscribe(),
            self.default_prefix.clone(),
        );
        let reporter = self.reporter.clone();

        self.worker = Some(tokio::spawn(async move {
            let result = tracker.run(&reporter, &control).await;
            (tracker, result)
        }));
        info!("Started tracking applications");
        Ok(())
    }

    /// Cooperative: the worker notices on its next iteration and exits.
    pub async fn stop_tracking(&mut self) {
        let was_tracking = self.tracking.swap(false, Ordering::AcqRel);
        self.reclaim_worker().await;
        if was_tracking {
            info!("Stopped tracking applications");
        }
    }

    async fn reclaim_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.tracking.store(false, Ordering::Release);
        match worker.await {
            Ok((tracker, result)) => {
                if let Err(e) = result {
                    warn!("Previous tracking run ended with an error: {}", e);
                }
                self.idle = Some(tracker);
            }
            Err(e) => error!("Tracking worker panicked: {}", e),
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.message_tx.send_replace(message.into());
    }

    pub fn current_activity(&self) -> Option<ActivityChange> {
        self.activity_rx.borrow().clone()
    }

    pub async fn status(&self) -> ControllerStatus {
        ControllerStatus {
            connected: self.is_connected().await,
            tracking: self.is_tracking(),
            message: self.message_tx.borrow().clone(),
            current: self.current_activity(),
        }
    }

    /// Stop the worker, wait for it, disconnect.
    pub async fn shutdown(&mut self) {
        self.stop_tracking().await;
        self.reporter.lock().await.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::presence::ScriptedClient;
    use crate::config::TimestampMode;
    use crate::error::Result;
    use crate::events::ActivityInfo;
    use crate::services::activity_monitor::ActivityMonitor;
    use crate::services::label_resolver::{LabelResolver, LabelTable};
    use crate::services::tracker::tests::{tracker, ScriptedMonitor};
    use crate::services::tracker::TrackerSettings;
    use std::time::Duration;

    struct PanickingMonitor;

    #[async_trait::async_trait]
    impl ActivityMonitor for PanickingMonitor {
        async fn sample(&mut self) -> Result<ActivityInfo> {
            panic!("foreground query blew up");
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    fn controller(connect_ok: bool, names: &[&str]) -> (TrackerController, Arc<parking_lot::Mutex<crate::services::presence::ClientLog>>) {
        let (client, log) = ScriptedClient::new(connect_ok);
        let tracker = tracker(ScriptedMonitor::names(names), &[("chrome.exe", "Google Chrome")]);
        let reporter = PresenceReporter::new(Box::new(client));
        (TrackerController::new(tracker, reporter, "bro is doing"), log)
    }

    #[tokio::test]
    async fn test_start_requires_connection() {
        let (mut controller, log) = controller(false, &["chrome.exe"]);

        assert!(!controller.connect().await);
        assert_eq!(controller.start_tracking().await, Err(StartRefused::NotConnected));
        assert!(!controller.is_tracking());
        assert!(log.lock().updates.is_empty());
    }

    #[tokio::test]
    async fn test_worker_reports_with_custom_message() {
        let (mut controller, log) = controller(true, &["chrome.exe", "chrome.exe"]);

        assert!(controller.connect().await);
        controller.set_message("coding");
        controller.start_tracking().await.unwrap();
        assert!(controller.is_tracking());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let status = controller.status().await;
        assert!(status.connected);
        assert_eq!(status.message, "coding");
        assert!(status.current.is_some());

        controller.stop_tracking().await;
        assert!(!controller.is_tracking());

        let log = log.lock();
        assert_eq!(log.updates[0].details, "coding: ");
        assert_eq!(log.updates[0].state, "Google Chrome");
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (mut controller, log) = controller(true, &["chrome.exe"]);

        assert!(controller.connect().await);
        controller.start_tracking().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.stop_tracking().await;
        let before = log.lock().updates.len();

        controller.start_tracking().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.shutdown().await;

        // A new session reports the current activity again.
        assert!(log.lock().updates.len() > before);
        assert_eq!(log.lock().closes, 1);
        assert!(!controller.is_connected().await);
    }

    #[tokio::test]
    async fn test_start_after_worker_panic_is_refused() {
        let (client, _log) = ScriptedClient::new(true);
        let tracker = Tracker::new(
            Box::new(PanickingMonitor),
            LabelResolver::new(Arc::new(LabelTable::default()), Vec::new()),
            TrackerSettings {
                poll_interval: Duration::from_millis(1),
                error_backoff: Duration::from_millis(1),
                timestamp_mode: TimestampMode::Session,
            },
        );
        let mut controller = TrackerController::new(tracker, PresenceReporter::new(Box::new(client)), "p");

        assert!(controller.connect().await);
        assert_eq!(controller.start_tracking().await, Ok(()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!controller.is_tracking());

        assert_eq!(controller.start_tracking().await, Err(StartRefused::Unavailable));
        assert!(!controller.is_tracking());
        // Shutdown still disconnects cleanly.
        controller.shutdown().await;
        assert!(!controller.is_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_stops_tracking() {
        let (mut controller, _log) = controller(true, &["chrome.exe"]);

        assert!(controller.connect().await);
        controller.start_tracking().await.unwrap();
        controller.disconnect().await;

        assert!(!controller.is_tracking());
        assert!(!controller.is_connected().await);
        // Second disconnect is a no-op.
        controller.disconnect().await;
    }
}
