pub mod activity;
pub mod presence;

pub use activity::{ActivityChange, ActivityInfo};
pub use presence::{unix_timestamp, PresenceUpdate};
