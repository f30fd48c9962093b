use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One presence update as handed to the presence client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub details: String,
    pub state: String,
    /// Unix seconds the "elapsed" counter starts from.
    pub start_timestamp: i64,
    pub pid: Option<u32>,
}

impl PresenceUpdate {
    pub fn new(details: impl Into<String>, state: impl Into<String>, start_timestamp: i64) -> Self {
        Self {
            details: details.into(),
            state: state.into(),
            start_timestamp,
            pid: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }
}

impl fmt::Display for PresenceUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} (since {})", self.details, self.state, self.start_timestamp)
    }
}

pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
