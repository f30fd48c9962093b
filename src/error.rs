use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresenceError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No active window")]
    NoActiveWindow,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Could not connect to Discord: {0}")]
    Connect(String),

    #[error("Not connected to Discord")]
    NotConnected,

    #[error("Presence update rejected: {0}")]
    Update(String),

    #[error("Discord IPC protocol error: {0}")]
    Protocol(String),

    #[error("Label table edit failed: {0}")]
    LabelTableEdit(String),
}

impl PresenceError {
    /// Errors that only affect one sample or one update; the tracker keeps going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PresenceError::Config(_) | PresenceError::LabelTableEdit(_))
    }
}

pub type Result<T> = std::result::Result<T, PresenceError>;

#[macro_export]
macro_rules! presence_error {
    (command, $($arg:tt)*) => {
        $crate::error::PresenceError::Command(format!($($arg)*))
    };
    (connect, $($arg:tt)*) => {
        $crate::error::PresenceError::Connect(format!($($arg)*))
    };
    (update, $($arg:tt)*) => {
        $crate::error::PresenceError::Update(format!($($arg)*))
    };
    (protocol, $($arg:tt)*) => {
        $crate::error::PresenceError::Protocol(format!($($arg)*))
    };
    (label_table, $($arg:tt)*) => {
        $crate::error::PresenceError::LabelTableEdit(format!($($arg)*))
    };
}
