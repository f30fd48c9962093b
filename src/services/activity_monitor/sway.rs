use super::command::{process_name, run_tool};
use super::r#trait::ForegroundBackend;
use crate::error::{PresenceError, Result};
use crate::events::ActivityInfo;
use serde_json::Value;
use std::time::Duration;

pub struct SwayDetector {
    timeout: Duration,
}

/// Focused leaf of the sway tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FocusedNode {
    pub pid: Option<u32>,
    pub app_id: Option<String>,
    pub name: Option<String>,
}

impl SwayDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ForegroundBackend for SwayDetector {
    async fn test(&self) -> Result<()> {
        run_tool("swaymsg", &["-t", "get_version"], self.timeout).await?;
        Ok(())
    }

    async fn get_active_activity(&self) -> Result<ActivityInfo> {
        let stdout = run_tool("swaymsg", &["-t", "get_tree", "-r"], self.timeout).await?;
        let tree: Value = serde_json::from_str(&stdout)?;
        let node = find_focused(&tree).ok_or(PresenceError::NoActiveWindow)?;

        let activity = match node.pid {
            Some(pid) => match process_name(pid) {
                Ok(name) => ActivityInfo::new(name).with_pid(pid),
                Err(_) => ActivityInfo::new(node.app_id.clone().ok_or(PresenceError::NoActiveWindow)?)
                    .with_pid(pid),
            },
            None => ActivityInfo::new(node.app_id.clone().ok_or(PresenceError::NoActiveWindow)?),
        };

        Ok(activity.with_title(node.name.unwrap_or_default()))
    }
}

pub(super) fn find_focused(node: &Value) -> Option<FocusedNode> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        // Workspaces can be focused too; only nodes backed by a client count.
        let pid = node
            .get("pid")
            .and_then(Value::as_u64)
            .and_then(|pid| u32::try_from(pid).ok())
            .filter(|pid| *pid != 0);
        let app_id = node
            .get("app_id")
            .and_then(Value::as_str)
            .or_else(|| node.pointer("/window_properties/class").and_then(Value::as_str))
            .map(str::to_string);

        if pid.is_some() || app_id.is_some() {
            return Some(FocusedNode {
                pid,
                app_id,
                name: node.get("name").and_then(Value::as_str).map(str::to_string),
            });
        }
        return None;
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(find_focused)
}
