use crate::error::Result;
use crate::presence_error;
use crate::services::LabelTable;
use crate::utils::{confirm, prompt_line};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use toml_edit::{value, DocumentMut};
use tracing::info;

const SECTION: &str = "labels";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Added,
    Replaced,
    /// The user declined to overwrite an existing entry.
    Cancelled,
    /// Empty process or display name.
    NoInput,
}

/// Offline editor for `labels.toml`: one entry per invocation.
pub struct TableEditor {
    path: PathBuf,
}

impl TableEditor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn run<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> Result<EditOutcome> {
        if !self.path.exists() {
            return Err(presence_error!(label_table, "{} not found", self.path.display()));
        }

        let source = std::fs::read_to_string(&self.path)?;
        let table = LabelTable::parse(&source)
            .map_err(|e| presence_error!(label_table, "{} is not a valid label table: {}", self.path.display(), e))?;

        writeln!(output, "Current label table ({}):", self.path.display())?;
        writeln!(output, "{}", source)?;

        let process_name = prompt_line(input, output, "Enter process name (example: chrome.exe): ")?
            .map(|name| name.trim().to_string())
            .unwrap_or_default();
        if process_name.is_empty() {
            writeln!(output, "No process name entered. Exiting.")?;
            return Ok(EditOutcome::NoInput);
        }

        let exists = table.get(&process_name).is_some();
        if exists && !confirm(input, output, "This process already exists. Override? (y/n): ")? {
            writeln!(output, "Operation cancelled.")?;
            return Ok(EditOutcome::Cancelled);
        }

        let display_name = prompt_line(input, output, "Enter display name (example: Google Chrome): ")?
            .map(|name| name.trim().to_string())
            .unwrap_or_default();
        if display_name.is_empty() {
            writeln!(output, "No display name entered. Exiting.")?;
            return Ok(EditOutcome::NoInput);
        }

        let updated = upsert_entry(&source, &process_name, &display_name)?;
        LabelTable::parse(&updated)
            .map_err(|e| presence_error!(label_table, "refusing to write an unreadable table: {}", e))?;
        std::fs::write(&self.path, updated)?;

        info!("Label table {:?}: {} -> {}", self.path, process_name, display_name);
        writeln!(output, "Updated {}", self.path.display())?;

        Ok(if exists {
            EditOutcome::Replaced
        } else {
            EditOutcome::Added
        })
    }
}

/// Drops any entry for `key` from `[labels]` and appends the new one at the
/// end of that table. Comments, ordering and other tables are preserved.
fn upsert_entry(source: &str, key: &str, display: &str) -> Result<String> {
    let mut doc: DocumentMut = source
        .parse()
        .map_err(|e| presence_error!(label_table, "cannot edit label table: {}", e))?;

    let labels = doc
        .entry(SECTION)
        .or_insert_with(toml_edit::table)
        .as_table_like_mut()
        .ok_or_else(|| presence_error!(label_table, "'{}' is not a table", SECTION))?;

    labels.remove(key);
    labels.insert(key, value(display));

    Ok(doc.to_string())
}
