//! Run task records.
//!
//! A task is one dispatch attempt. At most one task may be running per sync
//! at any time; that is the core concurrency invariant the dispatcher
//! checks before issuing a run.

use serde::{Deserialize, Serialize};

use crate::ids::{SyncId, TaskId};

/// Lifecycle status of a dispatch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage string form.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatch attempt and its outcome so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub sync_id: SyncId,
    pub status: TaskStatus,
    /// ISO-8601 UTC timestamp.
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_as_str_and_parse_roundtrip() {
        for status in [TaskStatus::Running, TaskStatus::Succeeded, TaskStatus::Failed] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("cancelled"), None);
    }

    #[test]
    fn status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }

    #[test]
    fn task_optional_fields_skipped() {
        let task = Task {
            id: TaskId::new("t1"),
            sync_id: SyncId::new("snc_1"),
            status: TaskStatus::Running,
            started_at: "2026-08-06T10:00:00Z".into(),
            finished_at: None,
            error_message: None,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("finished_at").is_none());
        assert!(json.get("error_message").is_none());
    }
}
