//! Status and log URL construction.
//!
//! URLs are deterministic functions of `(task, sync, workspace)` — nothing
//! about them is stored, so they can be rebuilt for any task a caller holds
//! an id for.

use flowlink_types::ids::{SyncId, TaskId, WorkspaceId};

/// Builds task status/log URLs under a public base URL.
#[derive(Debug, Clone)]
pub struct RunUrls {
    base: String,
}

impl RunUrls {
    /// Create a builder rooted at `base` (e.g. `https://console.example.com`).
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Status endpoint for one task.
    #[must_use]
    pub fn status(&self, workspace: &WorkspaceId, sync: &SyncId, task: &TaskId) -> String {
        format!(
            "{}/api/workspaces/{workspace}/syncs/{sync}/tasks/{task}/status",
            self.base
        )
    }

    /// Log endpoint for one task.
    #[must_use]
    pub fn logs(&self, workspace: &WorkspaceId, sync: &SyncId, task: &TaskId) -> String {
        format!(
            "{}/api/workspaces/{workspace}/syncs/{sync}/tasks/{task}/logs",
            self.base
        )
    }
}
