use crate::config::DetectorConfig;
use crate::error::{PresenceError, Result};
use crate::events::ActivityInfo;
use crate::presence_error;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::hyprland::HyprlandDetector;
use super::kdotool::KdotoolDetector;
use super::osascript::OsascriptDetector;
use super::r#trait::{ActivityMonitor, ForegroundBackend};
use super::sway::SwayDetector;
use super::win32::Win32Detector;
use super::xdotool::XdotoolDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DesktopEnvironment {
    Kde,
    Sway,
    Hyprland,
    X11Generic,
    WaylandGeneric,
    MacOs,
    Windows,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Kdotool,
    Xdotool,
    Sway,
    Hyprland,
    Osascript,
    Win32,
}

impl WorkingMethod {
    fn from_config(method: &str) -> Option<Self> {
        match method {
            "xdotool" => Some(Self::Xdotool),
            "kdotool" => Some(Self::Kdotool),
            "sway" => Some(Self::Sway),
            "hyprland" => Some(Self::Hyprland),
            "osascript" => Some(Self::Osascript),
            "win32" => Some(Self::Win32),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Kdotool => "kdotool",
            Self::Xdotool => "xdotool",
            Self::Sway => "sway",
            Self::Hyprland => "hyprland",
            Self::Osascript => "osascript",
            Self::Win32 => "win32",
        }
    }
}

pub struct RealActivityMonitor {
    desktop_env: DesktopEnvironment,
    /// Set when the configuration names one backend; `auto` leaves it empty.
    pinned_method: Option<WorkingMethod>,
    working_method: Option<WorkingMethod>,
    /// Probe order for `auto`, most specific first.
    candidates: Vec<WorkingMethod>,
    backends: Vec<(WorkingMethod, Box<dyn ForegroundBackend>)>,
    /// Bound on a whole probe round, not on each candidate.
    probe_timeout: Duration,
}

impl RealActivityMonitor {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let desktop_env = Self::detect_desktop_environment();
        info!("Detected desktop environment: {:?}", desktop_env);

        let pinned_method = match config.method.as_str() {
            "auto" => None,
            method => Some(
                WorkingMethod::from_config(method)
                    .ok_or_else(|| presence_error!(command, "unknown detector method '{}'", method))?,
            ),
        };

        let timeout = config.sample_timeout();
        let backends: Vec<(WorkingMethod, Box<dyn ForegroundBackend>)> = vec![
            (WorkingMethod::Kdotool, Box::new(KdotoolDetector::new(timeout))),
            (WorkingMethod::Xdotool, Box::new(XdotoolDetector::new(timeout))),
            (WorkingMethod::Sway, Box::new(SwayDetector::new(timeout))),
            (WorkingMethod::Hyprland, Box::new(HyprlandDetector::new(timeout))),
            (WorkingMethod::Osascript, Box::new(OsascriptDetector::new(timeout))),
            (WorkingMethod::Win32, Box::new(Win32Detector::new())),
        ];

        Ok(Self {
            desktop_env,
            pinned_method,
            working_method: pinned_method,
            candidates: Self::candidates_for(desktop_env).to_vec(),
            backends,
            probe_timeout: timeout,
        })
    }

    fn detect_desktop_environment() -> DesktopEnvironment {
        if cfg!(target_os = "macos") {
            return DesktopEnvironment::MacOs;
        }
        if cfg!(target_os = "windows") {
            return DesktopEnvironment::Windows;
        }

        if std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some() {
            return DesktopEnvironment::Hyprland;
        }
        if std::env::var_os("SWAYSOCK").is_some() {
            return DesktopEnvironment::Sway;
        }

        if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
            if desktop.to_lowercase().contains("kde") {
                return DesktopEnvironment::Kde;
            }
        }

        if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
            match session.as_str() {
                "wayland" => return DesktopEnvironment::WaylandGeneric,
                "x11" => return DesktopEnvironment::X11Generic,
                _ => {}
            }
        }

        if std::env::var_os("DISPLAY").is_some() {
            return DesktopEnvironment::X11Generic;
        }

        DesktopEnvironment::Unknown
    }

    fn candidates_for(desktop_env: DesktopEnvironment) -> &'static [WorkingMethod] {
        use WorkingMethod::*;
        match desktop_env {
            DesktopEnvironment::Kde => &[Kdotool, Xdotool],
            DesktopEnvironment::Sway => &[Sway, Xdotool],
            DesktopEnvironment::Hyprland => &[Hyprland, Xdotool],
            DesktopEnvironment::X11Generic => &[Xdotool],
            DesktopEnvironment::WaylandGeneric => &[Kdotool, Sway, Hyprland, Xdotool],
            DesktopEnvironment::MacOs => &[Osascript],
            DesktopEnvironment::Windows => &[Win32],
            DesktopEnvironment::Unknown => &[Xdotool, Kdotool, Sway, Hyprland],
        }
    }

    fn backend(&self, method: WorkingMethod) -> Result<&dyn ForegroundBackend> {
        self.backends
            .iter()
            .find(|(candidate, _)| *candidate == method)
            .map(|(_, backend)| backend.as_ref())
            .ok_or_else(|| presence_error!(command, "no backend registered for {:?}", method))
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        info!("Looking for a working foreground detection method...");

        for method in &self.candidates {
            match self.backend(*method)?.test().await {
                Ok(()) => {
                    info!("Using {:?}", method);
                    return Ok(*method);
                }
                Err(e) => debug!("{:?} is not usable: {}", method, e),
            }
        }

        Err(presence_error!(
            command,
            "no foreground detection method works in {:?}",
            self.desktop_env
        ))
    }
}

#[async_trait::async_trait]
impl ActivityMonitor for RealActivityMonitor {
    async fn sample(&mut self) -> Result<ActivityInfo> {
        let method = match self.working_method {
            Some(method) => method,
            None => {
                let method = tokio::time::timeout(self.probe_timeout, self.detect_working_method())
                    .await
                    .map_err(|_| PresenceError::Timeout(self.probe_timeout))??;
                self.working_method = Some(method);
                method
            }
        };

        match self.backend(method)?.get_active_activity().await {
            Ok(activity) => Ok(activity),
            Err(PresenceError::NoActiveWindow) => Err(PresenceError::NoActiveWindow),
            Err(e) => {
                if self.pinned_method.is_none() {
                    warn!("Method {:?} stopped working: {}. Re-detecting on the next sample", method, e);
                    self.working_method = None;
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        self.working_method.map_or("auto", WorkingMethod::name)
    }
}

impl Drop for RealActivityMonitor {
    fn drop(&mut self) {
        debug!("RealActivityMonitor shutting down");
    }
}
