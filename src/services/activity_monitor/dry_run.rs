use super::r#trait::ActivityMonitor;
use crate::error::{PresenceError, Result};
use crate::events::ActivityInfo;
use tracing::info;

const FAKE_ACTIVITIES: &[&str] = &["chrome.exe", "Code.exe", "discord.exe", "", "steam.exe"];

/// Each fake activity is held for this many samples so change detection has something to skip.
const SAMPLES_PER_ACTIVITY: usize = 5;

/// Cycles through fake process names; an empty entry simulates "no foreground window".
pub struct DryRunMonitor {
    samples: usize,
}

impl DryRunMonitor {
    pub fn new() -> Self {
        info!("Dry-run mode: activity monitor emulates foreground changes");
        Self { samples: 0 }
    }
}

#[async_trait::async_trait]
impl ActivityMonitor for DryRunMonitor {
    async fn sample(&mut self) -> Result<ActivityInfo> {
        let index = (self.samples / SAMPLES_PER_ACTIVITY) % FAKE_ACTIVITIES.len();
        self.samples += 1;

        match FAKE_ACTIVITIES[index] {
            "" => Err(PresenceError::NoActiveWindow),
            name => Ok(ActivityInfo::new(name).with_pid(10_000 + index as u32)),
        }
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}
