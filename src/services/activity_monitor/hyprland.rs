use super::command::{process_name, run_tool};
use super::r#trait::ForegroundBackend;
use crate::error::{PresenceError, Result};
use crate::events::ActivityInfo;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub(super) struct HyprlandWindow {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pid: i64,
}

pub struct HyprlandDetector {
    timeout: Duration,
}

impl HyprlandDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ForegroundBackend for HyprlandDetector {
    async fn test(&self) -> Result<()> {
        run_tool("hyprctl", &["version"], self.timeout).await?;
        Ok(())
    }

    async fn get_active_activity(&self) -> Result<ActivityInfo> {
        let stdout = run_tool("hyprctl", &["activewindow", "-j"], self.timeout).await?;
        let window = parse_active_window(&stdout)?;

        let pid = u32::try_from(window.pid).ok().filter(|pid| *pid != 0);
        let activity = match pid {
            Some(pid) => {
                let name = match process_name(pid) {
                    Ok(name) => name,
                    Err(_) if !window.class.is_empty() => window.class.clone(),
                    Err(e) => return Err(e),
                };
                ActivityInfo::new(name).with_pid(pid)
            }
            None if !window.class.is_empty() => ActivityInfo::new(window.class.clone()),
            None => return Err(PresenceError::NoActiveWindow),
        };

        Ok(activity.with_title(window.title))
    }
}

pub(super) fn parse_active_window(stdout: &str) -> Result<HyprlandWindow> {
    let stdout = stdout.trim();
    // hyprctl prints "Invalid" or "{}" when no window has focus.
    if stdout.is_empty() || !stdout.starts_with('{') || stdout == "{}" {
        return Err(PresenceError::NoActiveWindow);
    }
    Ok(serde_json::from_str(stdout)?)
}
