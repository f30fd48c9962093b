use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CLIENT_ID: &str = "1404326169888690296";
pub const DEFAULT_DETAILS_PREFIX: &str = "bro is doing";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Log file; empty disables file logging.
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ButtonConfig {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// Elapsed time counts from the moment tracking started.
    Session,
    /// Elapsed time restarts with every reported activity.
    Activity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    pub poll_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub details_prefix: String,
    pub timestamp_mode: TimestampMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    pub method: String,
    pub sample_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabelsConfig {
    pub path: PathBuf,
    pub strip_suffixes: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            file: PathBuf::from("logs/app.log"),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            timeout_ms: 5000,
            buttons: vec![ButtonConfig {
                label: "Get What Is Bro Doing".to_string(),
                url: "https://github.com/Ian-bug/WhatIsBroDoing".to_string(),
            }],
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            error_backoff_ms: 5000,
            details_prefix: DEFAULT_DETAILS_PREFIX.to_string(),
            timestamp_mode: TimestampMode::Session,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: "auto".to_string(),
            sample_timeout_ms: 5000,
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("labels.toml"),
            strip_suffixes: vec![".exe".to_string(), ".app".to_string()],
        }
    }
}

impl DiscordConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl DetectorConfig {
    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }
}

pub const DETECTION_METHODS: &[&str] = &[
    "auto",
    "xdotool",
    "kdotool",
    "sway",
    "hyprland",
    "osascript",
    "win32",
    "dry_run",
];

impl Config {
    /// Defaults, then the TOML file (if present), then `PRESENCE_*` env vars.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PRESENCE_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        if self.discord.client_id.trim().is_empty() {
            anyhow::bail!("discord.client_id must not be empty");
        }

        if self.discord.timeout_ms == 0 {
            anyhow::bail!("discord.timeout_ms must be greater than 0");
        }

        // Discord shows at most two buttons per activity.
        if self.discord.buttons.len() > 2 {
            anyhow::bail!("discord.buttons accepts at most 2 entries");
        }

        for (i, button) in self.discord.buttons.iter().enumerate() {
            if button.label.trim().is_empty() || button.url.trim().is_empty() {
                anyhow::bail!("Button #{} needs both a label and a url", i + 1);
            }
        }

        if self.tracking.poll_interval_ms < 100 {
            anyhow::bail!("tracking.poll_interval_ms must be at least 100");
        }

        if self.tracking.error_backoff_ms < self.tracking.poll_interval_ms {
            anyhow::bail!("tracking.error_backoff_ms must not be shorter than poll_interval_ms");
        }

        if !DETECTION_METHODS.contains(&self.detector.method.as_str()) {
            anyhow::bail!(
                "Invalid detector method: {} (expected one of {})",
                self.detector.method,
                DETECTION_METHODS.join(", ")
            );
        }

        if self.detector.sample_timeout_ms == 0 {
            anyhow::bail!("detector.sample_timeout_ms must be greater than 0");
        }

        Ok(())
    }
}
