pub mod catalog;
pub mod run;
pub mod serve;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use flowlink_dispatch::credentials::{CredentialResolver, OauthRefreshResolver};
use flowlink_dispatch::{Dispatcher, HttpExecutionClient, RunUrls, StaticCredentialResolver};
use flowlink_server::AppConfig;
use flowlink_state::SqliteStateBackend;

/// Open the state database at the configured (or default) path.
///
/// Commands that only touch storage use this instead of the full
/// [`AppConfig`], which requires the execution-service URL.
pub fn open_backend() -> Result<SqliteStateBackend> {
    let path = std::env::var("FLOWLINK_DB").unwrap_or_else(|_| "flowlink.db".to_string());
    SqliteStateBackend::open(Path::new(&path))
        .with_context(|| format!("Failed to open state DB at {path}"))
}

/// Build the full dispatch stack from environment configuration.
pub fn build_dispatcher(config: &AppConfig) -> Result<Dispatcher> {
    let backend = Arc::new(
        SqliteStateBackend::open(Path::new(&config.database_path))
            .with_context(|| format!("Failed to open state DB at {}", config.database_path))?,
    );

    let credentials: Arc<dyn CredentialResolver> = match (
        &config.oauth_token_url,
        &config.oauth_client_id,
        &config.oauth_client_secret,
    ) {
        (Some(url), Some(id), Some(secret)) => Arc::new(
            OauthRefreshResolver::new(url, id, secret)
                .context("Failed to build OAuth credential resolver")?,
        ),
        _ => Arc::new(StaticCredentialResolver),
    };

    let execution = HttpExecutionClient::new(
        config.execution_url.clone(),
        config.execution_auth_token.clone(),
    )
    .context("Failed to build execution service client")?;

    Ok(Dispatcher::new(
        backend.clone(),
        backend,
        credentials,
        Arc::new(execution),
        RunUrls::new(config.public_url.clone()),
    ))
}
