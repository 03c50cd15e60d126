//! Run dispatcher: resolves the sync link, reconstructs state and catalog,
//! and issues exactly one read dispatch to the execution service.
//!
//! Per sync, a run moves `IDLE -> RUNNING -> (SUCCEEDED | FAILED)`; at most
//! one task may be running at a time. The running-task check is a
//! point-in-time existence check, not a serialized claim — the window
//! between check and task insert is open to concurrent callers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowlink_state::{ConfigStore, StateBackend};
use flowlink_types::catalog::ConfiguredCatalog;
use flowlink_types::ids::{SyncId, TaskId, WorkspaceId};
use flowlink_types::link::ServiceConfig;
use flowlink_types::task::{Task, TaskStatus};

use crate::credentials::CredentialResolver;
use crate::error::Result;
use crate::executor::{ExecutionService, ReadRequest};
use crate::state::load_checkpoint_state;
use crate::urls::RunUrls;

const ERR_SYNC_NOT_FOUND: &str = "Sync not found";
const ERR_SERVICE_NOT_FOUND: &str = "Source service not found";
const ERR_ALREADY_RUNNING: &str = "Sync is already running";
const ERR_CATALOG_MISSING: &str =
    "No stored catalog for this source version. Run catalog discovery and try again.";

/// Outcome of one run request. Business outcomes are values here; only
/// faults surface as [`DispatchError`](crate::DispatchError).
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Dispatch accepted; the remote job is running.
    Started {
        task_id: TaskId,
        status_url: String,
        logs_url: String,
    },
    /// A task is already running for this sync; no side effects occurred.
    AlreadyRunning {
        task_id: TaskId,
        status_url: String,
        logs_url: String,
    },
    /// Link or service missing (or the link is deleted / not a sync).
    NotFound { message: String },
    /// No catalog captured for the source package/version/storage-key.
    CatalogMissing,
    /// Dispatch was attempted but rejected or unreachable. The task id was
    /// already assigned and is returned for diagnostics.
    DispatchFailed { error: String, task_id: TaskId },
}

/// Reference to the task blocking a new run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTaskRef {
    pub task_id: TaskId,
    pub status: String,
    pub logs: String,
}

/// Wire shape of the run entrypoint response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_task: Option<RunningTaskRef>,
}

impl RunResponse {
    /// Generic failure shape used when a fault reaches the boundary.
    #[must_use]
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl RunOutcome {
    /// Convert to the wire response.
    #[must_use]
    pub fn into_response(self) -> RunResponse {
        match self {
            Self::Started {
                task_id,
                status_url,
                logs_url,
            } => RunResponse {
                ok: true,
                task_id: Some(task_id),
                status: Some(status_url),
                logs: Some(logs_url),
                ..RunResponse::default()
            },
            Self::AlreadyRunning {
                task_id,
                status_url,
                logs_url,
            } => RunResponse {
                ok: false,
                error: Some(ERR_ALREADY_RUNNING.into()),
                running_task: Some(RunningTaskRef {
                    task_id,
                    status: status_url,
                    logs: logs_url,
                }),
                ..RunResponse::default()
            },
            Self::NotFound { message } => RunResponse::from_error(message),
            Self::CatalogMissing => RunResponse::from_error(ERR_CATALOG_MISSING),
            Self::DispatchFailed { error, task_id } => RunResponse {
                ok: false,
                error: Some(error),
                task_id: Some(task_id),
                ..RunResponse::default()
            },
        }
    }
}

/// Orchestrates sync runs against the configuration store, state backend,
/// credential resolver, and execution service.
pub struct Dispatcher {
    config: Arc<dyn ConfigStore>,
    state: Arc<dyn StateBackend>,
    credentials: Arc<dyn CredentialResolver>,
    execution: Arc<dyn ExecutionService>,
    urls: RunUrls,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        config: Arc<dyn ConfigStore>,
        state: Arc<dyn StateBackend>,
        credentials: Arc<dyn CredentialResolver>,
        execution: Arc<dyn ExecutionService>,
        urls: RunUrls,
    ) -> Self {
        Self {
            config,
            state,
            credentials,
            execution,
            urls,
        }
    }

    /// Run a sync: check for an in-flight task, assemble the read request
    /// (credentials, catalog, checkpoint state), dispatch it, and return a
    /// task handle or a structured outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`](crate::DispatchError) on storage faults or
    /// corrupt checkpoint state. Expected conditions (missing
    /// link/service/catalog, a run already in flight, a rejected dispatch)
    /// are [`RunOutcome`] values.
    pub async fn run_sync(
        &self,
        workspace: &WorkspaceId,
        sync: &SyncId,
        full_sync: bool,
    ) -> Result<RunOutcome> {
        tracing::info!(workspace = %workspace, sync = %sync, full_sync, "Run requested");

        let link = {
            let config = self.config.clone();
            let workspace = workspace.clone();
            let sync = sync.clone();
            tokio::task::spawn_blocking(move || config.get_sync_link(&workspace, &sync)).await??
        };
        let Some(link) = link.filter(flowlink_types::link::SyncLink::is_runnable) else {
            return Ok(RunOutcome::NotFound {
                message: ERR_SYNC_NOT_FOUND.into(),
            });
        };

        if let Some(task) = {
            let state = self.state.clone();
            let sync = sync.clone();
            tokio::task::spawn_blocking(move || state.running_task(&sync)).await??
        } {
            tracing::info!(sync = %sync, task = %task.id, "Run refused, task already in flight");
            return Ok(RunOutcome::AlreadyRunning {
                status_url: self.urls.status(workspace, sync, &task.id),
                logs_url: self.urls.logs(workspace, sync, &task.id),
                task_id: task.id,
            });
        }

        let service = {
            let config = self.config.clone();
            let workspace = workspace.clone();
            let from_id = link.from_id.clone();
            tokio::task::spawn_blocking(move || config.get_service_config(&workspace, &from_id))
                .await??
        };
        let Some(service) = service else {
            return Ok(RunOutcome::NotFound {
                message: ERR_SERVICE_NOT_FOUND.into(),
            });
        };

        let checkpoint = {
            let state = self.state.clone();
            let sync = sync.clone();
            tokio::task::spawn_blocking(move || {
                load_checkpoint_state(state.as_ref(), &sync, full_sync)
            })
            .await??
        };

        let Some(storage_key) = link.data.storage_key.clone() else {
            return Ok(RunOutcome::CatalogMissing);
        };
        let catalog = {
            let state = self.state.clone();
            let package = service.package.clone();
            let version = service.version.clone();
            tokio::task::spawn_blocking(move || {
                state.get_catalog(&storage_key, &package, &version)
            })
            .await??
        };
        let Some(catalog) = catalog else {
            return Ok(RunOutcome::CatalogMissing);
        };

        let configured = ConfiguredCatalog::select(&catalog, &link.data.streams);
        let task_id = TaskId::generate();

        let resolved = match self.credentials.resolve(&service).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(sync = %sync, task = %task_id, error = %e, "Credential resolution failed");
                return Ok(RunOutcome::DispatchFailed {
                    error: e.to_string(),
                    task_id,
                });
            }
        };

        {
            let state = self.state.clone();
            let task = Task {
                id: task_id.clone(),
                sync_id: sync.clone(),
                status: TaskStatus::Running,
                started_at: chrono::Utc::now().to_rfc3339(),
                finished_at: None,
                error_message: None,
            };
            tokio::task::spawn_blocking(move || state.insert_task(&task)).await??;
        }

        let request = ReadRequest {
            package: service.package.clone(),
            version: service.version.clone(),
            task_id: task_id.clone(),
            sync_id: sync.clone(),
            config: dispatch_config(&service, resolved.credentials),
            catalog: configured,
            state: checkpoint.map(|s| s.wire_value()),
        };

        match self.execution.read(&request).await {
            Ok(ack) if ack.ok => {
                tracing::info!(sync = %sync, task = %task_id, "Dispatch accepted");
                Ok(RunOutcome::Started {
                    status_url: self.urls.status(workspace, sync, &task_id),
                    logs_url: self.urls.logs(workspace, sync, &task_id),
                    task_id,
                })
            }
            Ok(ack) => {
                let error = ack.error.unwrap_or_else(|| "execution service refused the run".into());
                self.fail_task(&task_id, &error).await?;
                tracing::warn!(sync = %sync, task = %task_id, error = %error, "Dispatch rejected");
                Ok(RunOutcome::DispatchFailed { error, task_id })
            }
            Err(e) => {
                let error = e.to_string();
                self.fail_task(&task_id, &error).await?;
                tracing::error!(sync = %sync, task = %task_id, error = %error, "Dispatch failed");
                Ok(RunOutcome::DispatchFailed { error, task_id })
            }
        }
    }

    async fn fail_task(&self, task_id: &TaskId, error: &str) -> Result<()> {
        let state = self.state.clone();
        let task_id = task_id.clone();
        let error = error.to_string();
        tokio::task::spawn_blocking(move || {
            state.complete_task(&task_id, TaskStatus::Failed, Some(&error))
        })
        .await??;
        Ok(())
    }
}

/// Request `config` field: resolved credentials with the service id attached.
fn dispatch_config(service: &ServiceConfig, credentials: Value) -> Value {
    match credentials {
        Value::Object(mut map) => {
            map.insert(
                "id".to_string(),
                Value::String(service.id.as_str().to_string()),
            );
            Value::Object(map)
        }
        other => serde_json::json!({
            "id": service.id.as_str(),
            "credentials": other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlink_types::ids::ServiceId;
    use serde_json::json;

    fn service() -> ServiceConfig {
        ServiceConfig {
            id: ServiceId::new("src_1"),
            workspace_id: WorkspaceId::new("ws_1"),
            package: "source-postgres".into(),
            version: "1.4.0".into(),
            credentials: json!({"host": "db"}),
        }
    }

    #[test]
    fn dispatch_config_injects_service_id() {
        let config = dispatch_config(&service(), json!({"host": "db", "user": "u"}));
        assert_eq!(config["id"], "src_1");
        assert_eq!(config["host"], "db");
    }

    #[test]
    fn dispatch_config_wraps_non_object_credentials() {
        let config = dispatch_config(&service(), json!("raw-token"));
        assert_eq!(config["id"], "src_1");
        assert_eq!(config["credentials"], "raw-token");
    }

    #[test]
    fn started_response_shape() {
        let response = RunOutcome::Started {
            task_id: TaskId::new("t1"),
            status_url: "https://x/status".into(),
            logs_url: "https://x/logs".into(),
        }
        .into_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["taskId"], "t1");
        assert_eq!(json["status"], "https://x/status");
        assert_eq!(json["logs"], "https://x/logs");
        assert!(json.get("error").is_none());
        assert!(json.get("runningTask").is_none());
    }

    #[test]
    fn already_running_response_shape() {
        let response = RunOutcome::AlreadyRunning {
            task_id: TaskId::new("t1"),
            status_url: "https://x/status".into(),
            logs_url: "https://x/logs".into(),
        }
        .into_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], ERR_ALREADY_RUNNING);
        assert_eq!(json["runningTask"]["taskId"], "t1");
        assert_eq!(json["runningTask"]["status"], "https://x/status");
        assert!(json.get("taskId").is_none());
    }

    #[test]
    fn dispatch_failed_response_keeps_task_id() {
        let response = RunOutcome::DispatchFailed {
            error: "boom".into(),
            task_id: TaskId::new("t1"),
        }
        .into_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "boom");
        assert_eq!(json["taskId"], "t1");
    }

    #[test]
    fn from_error_is_bare_failure() {
        let json = serde_json::to_value(RunResponse::from_error("nope")).unwrap();
        assert_eq!(json, json!({"ok": false, "error": "nope"}));
    }
}
