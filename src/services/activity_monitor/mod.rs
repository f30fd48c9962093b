//! Activity monitor: responsibility and boundaries
//!
//! This module and its submodules only answer "which process owns the foreground
//! window right now". They never resolve display names and never talk to Discord;
//! that belongs to the label resolver and the presence reporter.

mod command;
mod dry_run;
mod hyprland;
mod kdotool;
mod monitor;
mod osascript;
mod sway;
mod r#trait;
mod win32;
mod xdotool;

pub use self::r#trait::{create_activity_monitor, ActivityMonitor};
