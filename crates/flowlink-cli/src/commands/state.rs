use anyhow::Result;

use flowlink_dispatch::state::decode_rows;
use flowlink_state::StateBackend;
use flowlink_types::checkpoint::CheckpointState;
use flowlink_types::ids::SyncId;

/// Execute `state show`: decode and print the current checkpoint state.
pub fn show(sync: &str) -> Result<()> {
    let backend = super::open_backend()?;
    let rows = backend.list_state(&SyncId::new(sync))?;
    let state = decode_rows(&rows)?;

    match state {
        None => println!("No checkpoint state for '{sync}'."),
        Some(state) => {
            let encoding = match &state {
                CheckpointState::Legacy(_) => "legacy".to_string(),
                CheckpointState::Global(_) => "global".to_string(),
                CheckpointState::PerStream(entries) => {
                    format!("per-stream ({} streams)", entries.len())
                }
            };
            println!("Encoding: {encoding}");
            println!("{}", serde_json::to_string_pretty(&state.wire_value())?);
        }
    }
    Ok(())
}

/// Execute `state clear`: delete all checkpoint rows for a sync.
pub fn clear(sync: &str) -> Result<()> {
    let backend = super::open_backend()?;
    let removed = backend.clear_state(&SyncId::new(sync))?;
    println!("Removed {removed} checkpoint row(s) for '{sync}'.");
    Ok(())
}
