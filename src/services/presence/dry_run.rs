use super::r#trait::PresenceClient;
use crate::error::{PresenceError, Result};
use crate::events::PresenceUpdate;
use tracing::info;

/// Logs presence updates instead of sending them to Discord.
#[derive(Default)]
pub struct DryRunPresenceClient {
    connected: bool,
}

impl DryRunPresenceClient {
    pub fn new() -> Self {
        Self { connected: false }
    }
}

#[async_trait::async_trait]
impl PresenceClient for DryRunPresenceClient {
    async fn connect(&mut self) -> Result<()> {
        info!("Dry-run: pretending to connect to Discord");
        self.connected = true;
        Ok(())
    }

    async fn set_activity(&mut self, update: &PresenceUpdate) -> Result<()> {
        if !self.connected {
            return Err(PresenceError::NotConnected);
        }
        info!(pid = ?update.pid, "Dry-run presence: {}", update);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.connected {
            info!("Dry-run: closing fake Discord connection");
        }
        self.connected = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}
