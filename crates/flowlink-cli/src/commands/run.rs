use anyhow::{Context, Result};

use flowlink_server::AppConfig;
use flowlink_types::ids::{SyncId, WorkspaceId};

/// Execute the `run` command: dispatch one sync and print the outcome.
pub async fn execute(workspace: &str, sync: &str, full_sync: bool) -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let dispatcher = super::build_dispatcher(&config)?;

    let outcome = dispatcher
        .run_sync(
            &WorkspaceId::new(workspace),
            &SyncId::new(sync),
            full_sync,
        )
        .await
        .context("Sync run failed")?;

    let response = outcome.into_response();
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.ok {
        Ok(())
    } else {
        anyhow::bail!(
            "run not started: {}",
            response.error.unwrap_or_else(|| "unknown error".into())
        )
    }
}
