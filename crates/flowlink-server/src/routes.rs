//! Router and request handlers.
//!
//! One substantive route: the run entrypoint. Authorization runs before any
//! state access; every fault is converted to the `{ok:false, error}` shape
//! so no raw error ever reaches the caller.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use flowlink_dispatch::{Dispatcher, RunResponse};
use flowlink_types::ids::{SyncId, WorkspaceId};

use crate::auth::{AuthError, DispatchAuth};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub auth: Arc<DispatchAuth>,
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    #[serde(rename = "fullSync")]
    full_sync: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn run_sync(
    State(state): State<AppState>,
    Path((workspace_id, sync_id)): Path<(String, String)>,
    Query(query): Query<RunQuery>,
    headers: HeaderMap,
) -> (StatusCode, Json<RunResponse>) {
    let workspace = WorkspaceId::new(workspace_id);
    let sync = SyncId::new(sync_id);

    match state.auth.authorize(bearer_token(&headers), &workspace).await {
        Ok(_) => {}
        Err(AuthError::Unauthorized) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(RunResponse::from_error("Unauthorized")),
            );
        }
        Err(e @ AuthError::Backend(_)) => {
            tracing::error!(workspace = %workspace, error = %e, "Authorization backend failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunResponse::from_error("Authorization failed")),
            );
        }
    }

    let full_sync = query
        .full_sync
        .as_deref()
        .is_some_and(|v| matches!(v, "true" | "1"));

    match state.dispatcher.run_sync(&workspace, &sync, full_sync).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into_response())),
        Err(e) => {
            tracing::error!(workspace = %workspace, sync = %sync, error = %e, "Sync run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunResponse::from_error(format!("Sync run failed: {e}"))),
            )
        }
    }
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/workspaces/:workspace_id/syncs/:sync_id/run",
            post(run_sync),
        )
        .layer(cors)
        .with_state(state)
}
