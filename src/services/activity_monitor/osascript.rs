use super::command::{parse_pid, run_tool};
use super::r#trait::ForegroundBackend;
use crate::error::{PresenceError, Result};
use crate::events::ActivityInfo;
use std::time::Duration;

const FRONTMOST_SCRIPT: &str = r#"tell application "System Events"
    set frontApp to first application process whose frontmost is true
    return (name of frontApp) & "|" & (unix id of frontApp)
end tell"#;

/// macOS: asks System Events for the frontmost application process.
pub struct OsascriptDetector {
    timeout: Duration,
}

impl OsascriptDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ForegroundBackend for OsascriptDetector {
    async fn test(&self) -> Result<()> {
        self.get_active_activity().await.map(|_| ())
    }

    async fn get_active_activity(&self) -> Result<ActivityInfo> {
        let stdout = run_tool("osascript", &["-e", FRONTMOST_SCRIPT], self.timeout).await?;
        parse_frontmost(&stdout)
    }
}

pub(super) fn parse_frontmost(stdout: &str) -> Result<ActivityInfo> {
    let stdout = stdout.trim();
    let (name, pid) = match stdout.rsplit_once('|') {
        Some((name, pid)) => (name.trim(), parse_pid(pid).ok()),
        None => (stdout, None),
    };

    if name.is_empty() {
        return Err(PresenceError::NoActiveWindow);
    }

    let activity = ActivityInfo::new(name);
    Ok(match pid {
        Some(pid) => activity.with_pid(pid),
        None => activity,
    })
}
