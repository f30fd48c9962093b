//! Interactive front ends: the command console and the label table editor.

pub mod console;
pub mod editor;

pub use console::{spawn_line_reader, Console};
pub use editor::TableEditor;
