use serde::{Deserialize, Serialize};
use std::fmt;

/// Process name reported when nothing has focus or the query failed.
pub const UNKNOWN_ACTIVITY: &str = "unknown";

/// Foreground activity as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub process_name: String,
    pub pid: Option<u32>,
    pub title: Option<String>,
}

impl ActivityInfo {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            pid: None,
            title: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ACTIVITY)
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.trim().is_empty()).then_some(title);
        self
    }
}

impl fmt::Display for ActivityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "{} (pid {})", self.process_name, pid),
            None => write!(f, "{}", self.process_name),
        }
    }
}

/// Activity the tracker last resolved, published for front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityChange {
    pub activity: ActivityInfo,
    pub display_name: String,
    pub reported: bool,
    pub timestamp: std::time::Instant,
}

impl ActivityChange {
    pub fn new(activity: ActivityInfo, display_name: String, reported: bool) -> Self {
        Self {
            activity,
            display_name,
            reported,
            timestamp: std::time::Instant::now(),
        }
    }
}

impl fmt::Display for ActivityChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> \"{}\"{} ({}s ago)",
            self.activity,
            self.display_name,
            if self.reported { "" } else { " [not reported]" },
            self.timestamp.elapsed().as_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_info_creation() {
        let activity = ActivityInfo::new("chrome.exe")
            .with_pid(1234)
            .with_title("Inbox - Google Chrome");

        assert_eq!(activity.process_name, "chrome.exe");
        assert_eq!(activity.pid, Some(1234));
        assert_eq!(activity.title.as_deref(), Some("Inbox - Google Chrome"));
        assert_eq!(activity.to_string(), "chrome.exe (pid 1234)");
    }

    #[test]
    fn test_blank_title_is_dropped() {
        let activity = ActivityInfo::new("code").with_title("   ");
        assert_eq!(activity.title, None);
    }

    #[test]
    fn test_unknown_sentinel() {
        let activity = ActivityInfo::unknown();
        assert_eq!(activity.process_name, UNKNOWN_ACTIVITY);
        assert_eq!(activity.pid, None);
        assert_eq!(activity.title, None);
    }
}
