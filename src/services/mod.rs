pub mod activity_monitor;
pub mod controller;
pub mod label_resolver;
pub mod presence;
pub mod tracker;

pub use activity_monitor::create_activity_monitor;
pub use controller::TrackerController;
pub use label_resolver::{LabelResolver, LabelTable};
pub use presence::{create_presence_client, PresenceReporter};
pub use tracker::{LoopControl, Tracker, TrackerSettings};
