use crate::config::Config;
use crate::error::Result;
use crate::events::ActivityInfo;

/// Source of foreground-activity samples.
#[async_trait::async_trait]
pub trait ActivityMonitor: Send {
    /// One bounded query of the foreground process.
    ///
    /// Fails with `NoActiveWindow` when nothing has focus; callers substitute
    /// the `"unknown"` sentinel instead of stopping.
    async fn sample(&mut self) -> Result<ActivityInfo>;

    fn name(&self) -> &'static str;
}

/// One way of asking the desktop for its foreground window.
#[async_trait::async_trait]
pub(super) trait ForegroundBackend: Send + Sync {
    /// Cheap check that the backend works in this session.
    async fn test(&self) -> Result<()>;

    async fn get_active_activity(&self) -> Result<ActivityInfo>;
}

/// Factory function to create an activity monitor based on the dry_run flag and configuration
pub fn create_activity_monitor(
    config: &Config,
    dry_run: bool,
) -> Result<Box<dyn ActivityMonitor + Send>> {
    if dry_run || config.detector.method == "dry_run" {
        Ok(Box::new(super::dry_run::DryRunMonitor::new()))
    } else {
        Ok(Box::new(super::monitor::RealActivityMonitor::new(
            &config.detector,
        )?))
    }
}
