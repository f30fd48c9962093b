pub mod prompt;

pub use prompt::{confirm, prompt_line};

/// Skips formatting of hot-path debug lines when DEBUG is filtered out.
#[macro_export]
macro_rules! debug_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}
