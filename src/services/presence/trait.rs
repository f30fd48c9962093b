use crate::config::Config;
use crate::error::Result;
use crate::events::PresenceUpdate;

/// Transport to the presence service.
///
/// Implementations return errors freely; `PresenceReporter` is the boundary
/// that turns them into logged booleans.
#[async_trait::async_trait]
pub trait PresenceClient: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn set_activity(&mut self, update: &PresenceUpdate) -> Result<()>;

    /// Must succeed when already closed.
    async fn close(&mut self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Factory function to create a presence client based on the dry_run flag
pub fn create_presence_client(config: &Config, dry_run: bool) -> Box<dyn PresenceClient + Send> {
    if dry_run {
        Box::new(super::dry_run::DryRunPresenceClient::new())
    } else {
        Box::new(super::ipc::DiscordIpcClient::new(&config.discord))
    }
}
