//! Checkpoint-state adapter.
//!
//! Translates between the three persisted row encodings and the canonical
//! [`CheckpointState`]. A full sync discards all rows first and runs with no
//! checkpoint state at all.

use flowlink_state::{StateBackend, StateRow};
use flowlink_types::checkpoint::{
    CheckpointState, InvalidStreamKey, StreamDescriptor, StreamState, GLOBAL_STATE_KEY,
    LEGACY_STATE_KEY,
};
use flowlink_types::ids::SyncId;

use crate::error::Result;

/// Load the checkpoint state for a sync.
///
/// With `full_sync` set, all rows for the sync are deleted and `None` is
/// returned so the dispatch request omits state entirely. Otherwise the rows
/// are decoded per their encoding; `None` means a fresh sync.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidStreamKey`](crate::DispatchError) if any
/// per-stream row carries a malformed key (the whole load is aborted), or
/// [`DispatchError::State`](crate::DispatchError) on storage failure.
pub fn load_checkpoint_state(
    backend: &dyn StateBackend,
    sync: &SyncId,
    full_sync: bool,
) -> Result<Option<CheckpointState>> {
    if full_sync {
        let removed = backend.clear_state(sync)?;
        if removed > 0 {
            tracing::info!(sync = %sync, removed, "Discarded checkpoint state for full sync");
        }
        return Ok(None);
    }

    let rows = backend.list_state(sync)?;
    Ok(decode_rows(&rows)?)
}

/// Decode persisted rows into canonical state.
///
/// Exactly one encoding is present at rest (or none); the writers hold that
/// invariant, so precedence here only matters for data that already violates
/// it: legacy wins over global wins over per-stream.
pub fn decode_rows(rows: &[StateRow]) -> std::result::Result<Option<CheckpointState>, InvalidStreamKey> {
    if rows.is_empty() {
        return Ok(None);
    }

    if let Some(row) = rows.iter().find(|r| r.stream == LEGACY_STATE_KEY) {
        return Ok(Some(CheckpointState::Legacy(row.state.clone())));
    }

    if let Some(row) = rows.iter().find(|r| r.stream == GLOBAL_STATE_KEY) {
        return Ok(Some(CheckpointState::Global(row.state.clone())));
    }

    let entries = rows
        .iter()
        .map(|row| {
            Ok(StreamState {
                descriptor: StreamDescriptor::parse_key(&row.stream)?,
                state: row.state.clone(),
            })
        })
        .collect::<std::result::Result<Vec<_>, InvalidStreamKey>>()?;
    Ok(Some(CheckpointState::PerStream(entries)))
}
