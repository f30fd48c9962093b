use super::command::{parse_pid, process_name, run_tool};
use super::r#trait::ForegroundBackend;
use crate::error::Result;
use crate::events::ActivityInfo;
use std::time::Duration;
use tracing::debug;

pub struct XdotoolDetector {
    timeout: Duration,
}

impl XdotoolDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ForegroundBackend for XdotoolDetector {
    async fn test(&self) -> Result<()> {
        run_tool("xdotool", &["getactivewindow"], self.timeout).await?;
        Ok(())
    }

    async fn get_active_activity(&self) -> Result<ActivityInfo> {
        debug!("Querying the active window through xdotool");
        let pid_raw = run_tool("xdotool", &["getactivewindow", "getwindowpid"], self.timeout).await?;

        match parse_pid(&pid_raw) {
            Ok(pid) => Ok(ActivityInfo::new(process_name(pid)?).with_pid(pid)),
            Err(_) => {
                // Some X clients never set _NET_WM_PID; the class name is the next best label.
                let class =
                    run_tool("xdotool", &["getactivewindow", "getwindowclassname"], self.timeout).await?;
                debug!("xdotool returned no pid, using window class '{}'", class);
                Ok(ActivityInfo::new(class))
            }
        }
    }
}
