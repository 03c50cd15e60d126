//! End-to-end dispatcher tests against an in-memory state backend and a
//! recording execution service.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use flowlink_dispatch::credentials::{CredentialError, CredentialResolver, ResolvedCredentials};
use flowlink_dispatch::executor::{ExecutionService, ExecutorError, ReadAck, ReadRequest};
use flowlink_dispatch::{Dispatcher, RunOutcome, RunUrls, StaticCredentialResolver};
use flowlink_state::{ConfigStore, SqliteStateBackend, StateBackend};
use flowlink_types::catalog::{Catalog, CatalogStream, SyncMode};
use flowlink_types::ids::{ServiceId, StorageKey, SyncId, TaskId, WorkspaceId};
use flowlink_types::link::{LinkData, ServiceConfig, StreamDirective, SyncLink};
use flowlink_types::task::{Task, TaskStatus};

/// Execution service double: records requests, returns a canned ack.
struct RecordingExecutor {
    ack: ReadAck,
    requests: Mutex<Vec<ReadRequest>>,
}

impl RecordingExecutor {
    fn accepting() -> Self {
        Self::with_ack(ReadAck {
            ok: true,
            error: None,
        })
    }

    fn with_ack(ack: ReadAck) -> Self {
        Self {
            ack,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn recorded(&self) -> Vec<ReadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionService for RecordingExecutor {
    async fn read(&self, request: &ReadRequest) -> Result<ReadAck, ExecutorError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.ack.clone())
    }
}

/// Credential resolver double that always fails.
struct FailingResolver;

#[async_trait]
impl CredentialResolver for FailingResolver {
    async fn resolve(
        &self,
        _service: &ServiceConfig,
    ) -> Result<ResolvedCredentials, CredentialError> {
        Err(CredentialError::Refresh("token endpoint said no".into()))
    }
}

fn ws() -> WorkspaceId {
    WorkspaceId::new("ws_1")
}

fn sync_id() -> SyncId {
    SyncId::new("snc_1")
}

fn catalog_stream(name: &str, namespace: Option<&str>) -> CatalogStream {
    CatalogStream {
        name: name.into(),
        namespace: namespace.map(Into::into),
        json_schema: Some(json!({"type": "object"})),
        supported_sync_modes: vec![SyncMode::FullRefresh, SyncMode::Incremental],
        source_defined_cursor: None,
        source_defined_primary_key: None,
    }
}

/// Seed a runnable link, its source service, and a captured catalog with
/// streams `customers` and `ns1.orders` (only `customers` selected).
fn seed(backend: &SqliteStateBackend) {
    let mut streams = BTreeMap::new();
    streams.insert(
        "customers".to_string(),
        StreamDirective {
            sync_mode: SyncMode::Incremental,
            cursor_field: Some("updated_at".into()),
            primary_key: None,
        },
    );
    backend
        .put_sync_link(&SyncLink {
            id: sync_id(),
            workspace_id: ws(),
            from_id: ServiceId::new("src_1"),
            kind: "sync".into(),
            data: LinkData {
                storage_key: Some(StorageKey::new("ws_1.src_1")),
                streams,
            },
            deleted: false,
        })
        .unwrap();
    backend
        .put_service_config(&ServiceConfig {
            id: ServiceId::new("src_1"),
            workspace_id: ws(),
            package: "source-postgres".into(),
            version: "1.4.0".into(),
            credentials: json!({"host": "db", "user": "flow"}),
        })
        .unwrap();
    backend
        .put_catalog(
            &StorageKey::new("ws_1.src_1"),
            "source-postgres",
            "1.4.0",
            &Catalog {
                streams: vec![
                    catalog_stream("customers", None),
                    catalog_stream("orders", Some("ns1")),
                ],
            },
        )
        .unwrap();
}

fn dispatcher(
    backend: &Arc<SqliteStateBackend>,
    executor: &Arc<RecordingExecutor>,
) -> Dispatcher {
    Dispatcher::new(
        backend.clone(),
        backend.clone(),
        Arc::new(StaticCredentialResolver),
        executor.clone(),
        RunUrls::new("https://console.example.com"),
    )
}

#[tokio::test]
async fn run_dispatches_filtered_catalog_and_state() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    backend
        .put_state(&sync_id(), "customers", &json!({"cursor": "2026-08-01"}))
        .unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    let RunOutcome::Started {
        task_id,
        status_url,
        logs_url,
    } = outcome
    else {
        panic!("expected Started, got {outcome:?}");
    };
    assert!(status_url.contains(task_id.as_str()));
    assert!(logs_url.ends_with("/logs"));

    let requests = executor.recorded();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.package, "source-postgres");
    assert_eq!(request.version, "1.4.0");
    assert_eq!(request.sync_id, sync_id());
    assert_eq!(request.task_id, task_id);

    // Credentials carry the service id.
    assert_eq!(request.config["id"], "src_1");
    assert_eq!(request.config["host"], "db");

    // Only the selected stream survives; ns1.orders is dropped.
    assert_eq!(request.catalog.streams.len(), 1);
    assert_eq!(request.catalog.streams[0].stream.name, "customers");
    assert_eq!(
        request.catalog.streams[0].cursor_field.as_deref(),
        Some("updated_at")
    );

    // Per-stream state arrives as tagged STREAM entries.
    let state = request.state.as_ref().unwrap();
    assert_eq!(state[0]["type"], "STREAM");
    assert_eq!(state[0]["stream"]["stream_descriptor"]["name"], "customers");

    // The dispatched task is recorded as running.
    let running = backend.running_task(&sync_id()).unwrap().unwrap();
    assert_eq!(running.id, task_id);
    assert_eq!(running.status, TaskStatus::Running);
}

#[tokio::test]
async fn missing_link_is_not_found() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    let executor = Arc::new(RecordingExecutor::accepting());

    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NotFound {
            message: "Sync not found".into()
        }
    );
    assert!(executor.recorded().is_empty());
}

#[tokio::test]
async fn deleted_link_is_not_found() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    let mut link = backend.get_sync_link(&ws(), &sync_id()).unwrap().unwrap();
    link.deleted = true;
    backend.put_sync_link(&link).unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::NotFound { .. }));
    assert!(executor.recorded().is_empty());
}

#[tokio::test]
async fn non_sync_link_kind_is_not_found() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    let mut link = backend.get_sync_link(&ws(), &sync_id()).unwrap().unwrap();
    link.kind = "push".into();
    backend.put_sync_link(&link).unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::NotFound { .. }));
}

#[tokio::test]
async fn missing_service_is_a_distinct_not_found() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    let mut link = backend.get_sync_link(&ws(), &sync_id()).unwrap().unwrap();
    link.from_id = ServiceId::new("src_gone");
    backend.put_sync_link(&link).unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::NotFound {
            message: "Source service not found".into()
        }
    );
}

#[tokio::test]
async fn missing_catalog_requires_rediscovery() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    let mut link = backend.get_sync_link(&ws(), &sync_id()).unwrap().unwrap();
    link.data.storage_key = Some(StorageKey::new("ws_1.other"));
    backend.put_sync_link(&link).unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::CatalogMissing);
    assert!(executor.recorded().is_empty());
}

#[tokio::test]
async fn running_task_blocks_new_runs_without_side_effects() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    backend
        .insert_task(&Task {
            id: TaskId::new("t0"),
            sync_id: sync_id(),
            status: TaskStatus::Running,
            started_at: "2026-08-06T09:00:00Z".into(),
            finished_at: None,
            error_message: None,
        })
        .unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let dispatcher = dispatcher(&backend, &executor);

    for _ in 0..2 {
        let outcome = dispatcher.run_sync(&ws(), &sync_id(), false).await.unwrap();
        let RunOutcome::AlreadyRunning { task_id, .. } = outcome else {
            panic!("expected AlreadyRunning, got {outcome:?}");
        };
        assert_eq!(task_id, TaskId::new("t0"));
    }

    assert!(executor.recorded().is_empty());
}

#[tokio::test]
async fn rejected_dispatch_keeps_generated_task_id() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);

    let executor = Arc::new(RecordingExecutor::with_ack(ReadAck {
        ok: false,
        error: Some("boom".into()),
    }));
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    let RunOutcome::DispatchFailed { error, task_id } = outcome else {
        panic!("expected DispatchFailed, got {outcome:?}");
    };
    assert_eq!(error, "boom");
    assert!(!task_id.as_str().is_empty());

    // The failed task is finalized, so the sync is runnable again.
    assert!(backend.running_task(&sync_id()).unwrap().is_none());
}

#[tokio::test]
async fn full_sync_discards_state_and_dispatches_without_it() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    backend
        .put_state(&sync_id(), "_LEGACY_STATE", &json!({"bookmark": 1}))
        .unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let outcome = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), true)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Started { .. }));
    assert!(executor.recorded()[0].state.is_none());
    assert!(backend.list_state(&sync_id()).unwrap().is_empty());
}

#[tokio::test]
async fn legacy_state_is_sent_verbatim() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    let blob = json!({"bookmarks": {"customers": "2026-07-01"}});
    backend.put_state(&sync_id(), "_LEGACY_STATE", &blob).unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap();

    assert_eq!(executor.recorded()[0].state.as_ref().unwrap(), &blob);
}

#[tokio::test]
async fn credential_failure_fails_the_dispatch() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);

    let executor = Arc::new(RecordingExecutor::accepting());
    let dispatcher = Dispatcher::new(
        backend.clone(),
        backend.clone(),
        Arc::new(FailingResolver),
        executor.clone(),
        RunUrls::new("https://console.example.com"),
    );

    let outcome = dispatcher.run_sync(&ws(), &sync_id(), false).await.unwrap();
    let RunOutcome::DispatchFailed { error, .. } = outcome else {
        panic!("expected DispatchFailed, got {outcome:?}");
    };
    assert!(error.contains("token refresh failed"));
    assert!(executor.recorded().is_empty());
}

#[tokio::test]
async fn corrupt_state_row_aborts_the_run() {
    let backend = Arc::new(SqliteStateBackend::in_memory().unwrap());
    seed(&backend);
    backend.put_state(&sync_id(), "a.b.c", &json!({})).unwrap();

    let executor = Arc::new(RecordingExecutor::accepting());
    let err = dispatcher(&backend, &executor)
        .run_sync(&ws(), &sync_id(), false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("a.b.c"));
    assert!(executor.recorded().is_empty());
}
