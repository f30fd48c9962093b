use crate::error::{PresenceError, Result};
use crate::presence_error;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use tokio::process::Command;
use tracing::debug;

/// Runs an external helper with a hard timeout and returns its trimmed stdout.
pub(super) async fn run_tool(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| PresenceError::Timeout(timeout))?
        .map_err(|e| presence_error!(command, "{} not available: {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("{} exited with {}: {}", program, output.status, stderr.trim());
        return Err(presence_error!(command, "{} exited with {}", program, output.status));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub(super) fn parse_pid(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid != 0)
        .ok_or_else(|| presence_error!(command, "invalid pid '{}'", raw.trim()))
}

/// Process name for a pid, the way task managers show it.
///
/// `name()` is cut at 15 bytes on Linux, so the executable's file name wins
/// when it extends the short name.
pub(super) fn process_name(pid: u32) -> Result<String> {
    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    if !system.refresh_process_specifics(sys_pid, ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet)) {
        return Err(presence_error!(command, "process {} is gone", pid));
    }

    let process = system
        .process(sys_pid)
        .ok_or_else(|| presence_error!(command, "process {} is gone", pid))?;
    let short = process.name().trim();
    let full = process
        .exe()
        .and_then(|exe| exe.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|full| !short.is_empty() && full.starts_with(short));

    match full {
        Some(full) => Ok(full),
        None if !short.is_empty() => Ok(short.to_string()),
        None => Err(PresenceError::NoActiveWindow),
    }
}
