//! Storage trait definitions.
//!
//! [`ConfigStore`] is the narrow contract onto the workspace configuration
//! layer (sync links and service configs — owned elsewhere, read here).
//! [`StateBackend`] covers what the dispatcher itself owns: checkpoint state
//! rows, captured catalogs, and task records. Model types live in
//! [`flowlink_types`].

use serde_json::Value;

use flowlink_types::catalog::Catalog;
use flowlink_types::ids::{ServiceId, StorageKey, SyncId, TaskId, WorkspaceId};
use flowlink_types::link::{ServiceConfig, SyncLink};
use flowlink_types::task::{Task, TaskStatus};

use crate::error;

/// One persisted checkpoint row, keyed by `(sync_id, stream)`.
///
/// `stream` is either a reserved sentinel (`_LEGACY_STATE`,
/// `_GLOBAL_STATE`) or a stream key; decoding into canonical state is the
/// dispatch layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRow {
    pub stream: String,
    pub state: Value,
}

/// Read access to workspace configuration objects.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn ConfigStore>`.
pub trait ConfigStore: Send + Sync {
    /// Fetch a sync link by id within a workspace.
    ///
    /// Soft-deleted links are returned as-is; runnability is the caller's
    /// check. Returns `Ok(None)` when no such link exists in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_sync_link(
        &self,
        workspace: &WorkspaceId,
        sync: &SyncId,
    ) -> error::Result<Option<SyncLink>>;

    /// Fetch a service config by id within a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_service_config(
        &self,
        workspace: &WorkspaceId,
        service: &ServiceId,
    ) -> error::Result<Option<ServiceConfig>>;

    /// Upsert a sync link (configuration-layer write path; used by seeding
    /// and tooling).
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_sync_link(&self, link: &SyncLink) -> error::Result<()>;

    /// Upsert a service config.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_service_config(&self, config: &ServiceConfig) -> error::Result<()>;
}

/// Storage contract for dispatcher-owned state.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn StateBackend>`.
pub trait StateBackend: Send + Sync {
    /// All checkpoint rows for a sync. Empty for a fresh sync.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn list_state(&self, sync: &SyncId) -> error::Result<Vec<StateRow>>;

    /// Upsert one checkpoint row.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_state(&self, sync: &SyncId, stream: &str, state: &Value) -> error::Result<()>;

    /// Delete all checkpoint rows for a sync, returning the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn clear_state(&self, sync: &SyncId) -> error::Result<u64>;

    /// Look up a captured catalog by its composite key.
    ///
    /// Returns `Ok(None)` when no capture exists — a normal outcome meaning
    /// discovery has to run again.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_catalog(
        &self,
        key: &StorageKey,
        package: &str,
        version: &str,
    ) -> error::Result<Option<Catalog>>;

    /// Store a captured catalog for a key triple.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_catalog(
        &self,
        key: &StorageKey,
        package: &str,
        version: &str,
        catalog: &Catalog,
    ) -> error::Result<()>;

    /// The currently running task for a sync, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn running_task(&self, sync: &SyncId) -> error::Result<Option<Task>>;

    /// Record a new task row.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn insert_task(&self, task: &Task) -> error::Result<()>;

    /// Finalize a task with a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn complete_task(
        &self,
        task: &TaskId,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> error::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the traits are object-safe.
    #[test]
    fn traits_are_object_safe() {
        fn _assert_config(_: &dyn ConfigStore) {}
        fn _assert_state(_: &dyn StateBackend) {}
    }
}
