use super::r#trait::PresenceClient;
use crate::events::PresenceUpdate;
use tracing::{debug, error, info, warn};

/// Connection state owned by the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Boundary around the presence client: every failure is logged and turned
/// into `false`, nothing propagates past it.
///
/// `Disconnected --connect--> Connected --update*--> Connected --disconnect--> Disconnected`.
/// A failed update leaves the state alone and nothing reconnects automatically.
pub struct PresenceReporter {
    client: Box<dyn PresenceClient + Send>,
    state: ConnectionState,
}

impl PresenceReporter {
    pub fn new(client: Box<dyn PresenceClient + Send>) -> Self {
        Self {
            client,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub async fn connect(&mut self) -> bool {
        if self.is_connected() {
            debug!("Already connected to presence service via {}", self.client.name());
            return true;
        }

        match self.client.connect().await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!("Connected to presence service via {}", self.client.name());
                true
            }
            Err(e) => {
                error!("Failed to connect to Discord: {}", e);
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    pub async fn update(&mut self, update: &PresenceUpdate) -> bool {
        if !self.is_connected() {
            warn!("Skipping presence update, not connected: {}", update);
            return false;
        }

        match self.client.set_activity(update).await {
            Ok(()) => {
                debug!("Presence updated: {}", update);
                true
            }
            Err(e) => {
                error!("Failed to update presence: {}", e);
                false
            }
        }
    }

    /// Best effort and idempotent.
    pub async fn disconnect(&mut self) {
        if !self.is_connected() {
            debug!("Disconnect requested while already disconnected");
            return;
        }

        if let Err(e) = self.client.close().await {
            error!("Error disconnecting from Discord: {}", e);
        }
        self.state = ConnectionState::Disconnected;
        info!("Disconnected from presence service");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{PresenceError, Result};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// What a scripted client was asked to do.
    #[derive(Debug, Default)]
    pub(crate) struct ClientLog {
        pub connects: usize,
        pub closes: usize,
        pub updates: Vec<PresenceUpdate>,
    }

    /// Presence client driven by canned results, shared with the tracker tests.
    pub(crate) struct ScriptedClient {
        pub log: Arc<Mutex<ClientLog>>,
        pub connect_ok: bool,
        /// Results for successive `set_activity` calls; empty means success.
        pub update_results: VecDeque<bool>,
    }

    impl ScriptedClient {
        pub fn new(connect_ok: bool) -> (Self, Arc<Mutex<ClientLog>>) {
            let log = Arc::new(Mutex::new(ClientLog::default()));
            (
                Self {
                    log: log.clone(),
                    connect_ok,
                    update_results: VecDeque::new(),
                },
                log,
            )
        }

        pub fn with_update_results(mut self, results: &[bool]) -> Self {
            self.update_results = results.iter().copied().collect();
            self
        }
    }

    #[async_trait::async_trait]
    impl PresenceClient for ScriptedClient {
        async fn connect(&mut self) -> Result<()> {
            self.log.lock().connects += 1;
            if self.connect_ok {
                Ok(())
            } else {
                Err(PresenceError::Connect("Discord is not running".to_string()))
            }
        }

        async fn set_activity(&mut self, update: &PresenceUpdate) -> Result<()> {
            self.log.lock().updates.push(update.clone());
            match self.update_results.pop_front().unwrap_or(true) {
                true => Ok(()),
                false => Err(PresenceError::Update("rejected".to_string())),
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.log.lock().closes += 1;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn update() -> PresenceUpdate {
        PresenceUpdate::new("bro is doing: ", "Google Chrome", 1)
    }

    #[tokio::test]
    async fn test_connect_update_disconnect() {
        let (client, log) = ScriptedClient::new(true);
        let mut reporter = PresenceReporter::new(Box::new(client));

        assert!(reporter.connect().await);
        assert_eq!(reporter.state, ConnectionState::Connected);
        assert!(reporter.update(&update()).await);

        reporter.disconnect().await;
        assert_eq!(reporter.state, ConnectionState::Disconnected);
        assert_eq!(log.lock().updates.len(), 1);
        assert_eq!(log.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_failed_connect_stays_disconnected() {
        let (client, log) = ScriptedClient::new(false);
        let mut reporter = PresenceReporter::new(Box::new(client));

        assert!(!reporter.connect().await);
        assert!(!reporter.is_connected());
        assert!(!reporter.update(&update()).await);
        // Not connected: the client is never asked to send anything.
        assert!(log.lock().updates.is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_connection() {
        let (client, _log) = ScriptedClient::new(true);
        let mut reporter = PresenceReporter::new(Box::new(client.with_update_results(&[false, true])));

        assert!(reporter.connect().await);
        assert!(!reporter.update(&update()).await);
        assert!(reporter.is_connected());
        assert!(reporter.update(&update()).await);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (client, log) = ScriptedClient::new(true);
        let mut reporter = PresenceReporter::new(Box::new(client));

        reporter.disconnect().await;
        assert!(reporter.connect().await);
        reporter.disconnect().await;
        reporter.disconnect().await;

        assert!(!reporter.is_connected());
        assert_eq!(log.lock().closes, 1);
    }
}
