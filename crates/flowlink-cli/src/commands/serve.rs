use std::sync::Arc;

use anyhow::{Context, Result};

use flowlink_server::{build_router, AppConfig, AppState, DispatchAuth, StaticWorkspaceAccess};

/// Execute the `serve` command: build the dispatch stack and run the HTTP
/// entrypoint.
pub async fn execute() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let dispatcher = super::build_dispatcher(&config)?;

    let access = match &config.user_tokens {
        Some(raw) => StaticWorkspaceAccess::from_json(raw)
            .map_err(|e| anyhow::anyhow!("Invalid USER_TOKENS: {e}"))?,
        None => StaticWorkspaceAccess::default(),
    };
    if config.service_secret.is_none() && config.user_tokens.is_none() {
        tracing::warn!("No service secret or user tokens configured, all runs will be rejected");
    }
    let auth = DispatchAuth::new(config.service_secret.clone(), Arc::new(access));

    let app = build_router(AppState {
        dispatcher: Arc::new(dispatcher),
        auth: Arc::new(auth),
    });

    let addr = config.bind_addr();
    tracing::info!(
        addr,
        execution_url = config.execution_url,
        db = config.database_path,
        "Starting run entrypoint"
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
