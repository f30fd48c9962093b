mod dry_run;
mod ipc;
mod reporter;
mod r#trait;

pub use self::reporter::PresenceReporter;
pub use self::r#trait::create_presence_client;

#[cfg(test)]
pub(crate) use self::reporter::tests::{ClientLog, ScriptedClient};
