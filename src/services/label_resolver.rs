use anyhow::Context;
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;

/// Shipped table, used when no `labels.toml` exists next to the config.
pub const BUILTIN_LABELS: &str = include_str!("../../labels.toml");

/// Shown when a process name resolves to nothing.
pub const UNKNOWN_APP: &str = "Unknown App";

#[derive(Debug, Default, Deserialize)]
struct LabelFile {
    #[serde(default)]
    labels: HashMap<String, String>,
}

/// Process name -> display name, loaded once at startup and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: HashMap<String, String>,
}

impl LabelTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Label table {:?} not found, using the built-in table", path);
            return Self::builtin();
        }

        let file: LabelFile = Figment::from(Toml::file(path))
            .extract()
            .with_context(|| format!("Failed to load label table from {:?}", path))?;

        info!("Loaded {} labels from {:?}", file.labels.len(), path);
        Ok(Self::new(file.labels))
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_LABELS)
    }

    pub fn parse(source: &str) -> Result<Self> {
        let file: LabelFile = Figment::from(Toml::string(source))
            .extract()
            .context("Failed to parse label table")?;
        Ok(Self::new(file.labels))
    }

    pub fn get(&self, process_name: &str) -> Option<&str> {
        self.entries.get(process_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pure mapping from raw process names to what Discord shows.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    table: Arc<LabelTable>,
    strip_suffixes: Vec<String>,
}

impl LabelResolver {
    pub fn new(table: Arc<LabelTable>, strip_suffixes: Vec<String>) -> Self {
        let strip_suffixes = strip_suffixes
            .into_iter()
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| suffix.to_lowercase())
            .collect();
        Self {
            table,
            strip_suffixes,
        }
    }

    /// Exact table match, otherwise the raw name minus one known suffix, trimmed.
    pub fn resolve(&self, raw: &str) -> String {
        if let Some(display) = self.table.get(raw) {
            return display.to_string();
        }

        let name = raw.trim();
        let name = self
            .strip_suffixes
            .iter()
            .find_map(|suffix| strip_suffix_ignore_case(name, suffix))
            .unwrap_or(name);

        match name.trim() {
            "" => UNKNOWN_APP.to_string(),
            name => name.to_string(),
        }
    }
}

/// Byte-wise so a case change that alters UTF-8 lengths can't shift the cut.
fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let start = name.len().checked_sub(suffix.len())?;
    let tail = name.get(start..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &name[..start])
}
