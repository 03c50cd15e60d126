//! Execution-service client.
//!
//! The execution service runs the actual read remotely; the dispatcher only
//! issues one `POST /read` per run and returns. The remote job's lifecycle
//! (status, logs) is polled out-of-band and is not awaited here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowlink_types::catalog::ConfiguredCatalog;
use flowlink_types::ids::{SyncId, TaskId};

/// One read dispatch: source coordinates, run identity, and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub package: String,
    pub version: String,
    pub task_id: TaskId,
    pub sync_id: SyncId,
    /// Resolved source credentials plus the service id.
    pub config: Value,
    pub catalog: ConfiguredCatalog,
    /// Checkpoint state in wire form; omitted for fresh or full syncs.
    pub state: Option<Value>,
}

/// JSON body of the read dispatch.
#[derive(Debug, Serialize)]
struct ReadBody<'a> {
    config: &'a Value,
    catalog: &'a ConfiguredCatalog,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a Value>,
}

/// Execution-service acknowledgment. `ok == false` means the service
/// rejected the run; the error text is surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Transport errors talking to the execution service.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Network or protocol failure.
    #[error("execution service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the execution service.
    #[error("execution service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Issues read dispatches to the execution service.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Dispatch one read. Synchronous from the caller's perspective; the
    /// remote job it starts is asynchronous.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] on transport failure. A well-formed
    /// rejection arrives as `ReadAck { ok: false, .. }` instead.
    async fn read(&self, request: &ReadRequest) -> Result<ReadAck, ExecutorError>;
}

/// HTTP client for the execution service.
pub struct HttpExecutionClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpExecutionClient {
    /// Create a client for the service at `base_url`, optionally carrying a
    /// service auth token on every request.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Http`] if the HTTP client can't be built.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
    ) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionClient {
    async fn read(&self, request: &ReadRequest) -> Result<ReadAck, ExecutorError> {
        let url = format!("{}/read", self.base_url);
        let body = ReadBody {
            config: &request.config,
            catalog: &request.catalog,
            state: request.state.as_ref(),
        };

        let mut req = self
            .client
            .post(&url)
            .query(&[
                ("package", request.package.as_str()),
                ("version", request.version.as_str()),
                ("taskId", request.task_id.as_str()),
                ("syncId", request.sync_id.as_str()),
            ])
            .json(&body);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
