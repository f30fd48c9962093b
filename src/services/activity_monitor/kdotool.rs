use super::command::{parse_pid, process_name, run_tool};
use super::r#trait::ForegroundBackend;
use crate::error::{PresenceError, Result};
use crate::events::ActivityInfo;
use std::time::Duration;
use tracing::debug;

/// KWin on Wayland, where xdotool only sees XWayland clients.
pub struct KdotoolDetector {
    timeout: Duration,
}

impl KdotoolDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ForegroundBackend for KdotoolDetector {
    async fn test(&self) -> Result<()> {
        debug!("=== Testing kdotool ===");
        let window_id = run_tool("kdotool", &["getactivewindow"], self.timeout).await?;
        if window_id.is_empty() {
            return Err(PresenceError::NoActiveWindow);
        }
        debug!("kdotool works, active window id: '{}'", window_id);
        Ok(())
    }

    async fn get_active_activity(&self) -> Result<ActivityInfo> {
        let window_id = run_tool("kdotool", &["getactivewindow"], self.timeout).await?;
        if window_id.is_empty() {
            return Err(PresenceError::NoActiveWindow);
        }

        let pid_raw = run_tool("kdotool", &["getwindowpid", &window_id], self.timeout).await?;
        match parse_pid(&pid_raw) {
            Ok(pid) => Ok(ActivityInfo::new(process_name(pid)?).with_pid(pid)),
            Err(_) => {
                let class = run_tool("kdotool", &["getwindowclassname", &window_id], self.timeout).await?;
                if class.is_empty() {
                    return Err(PresenceError::NoActiveWindow);
                }
                Ok(ActivityInfo::new(class))
            }
        }
    }
}
