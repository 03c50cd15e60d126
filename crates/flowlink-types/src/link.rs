//! Sync link and service configuration entities.
//!
//! These are owned by the workspace configuration layer; the dispatcher only
//! reads them. A [`SyncLink`] relates a source service to a destination and
//! carries the stream selection recorded by the console at configuration
//! time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::SyncMode;
use crate::ids::{ServiceId, StorageKey, SyncId, WorkspaceId};

/// Link kind that the dispatcher will run. Other kinds exist in the
/// configuration store but are not runnable.
pub const SYNC_LINK_KIND: &str = "sync";

/// Per-stream sync-mode directive recorded at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDirective {
    pub sync_mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
}

/// Data payload of a sync link: which streams to replicate and where the
/// catalog capture for this link lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkData {
    /// Recorded on the link when the catalog was last refreshed; key into
    /// catalog storage together with the source package and version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<StorageKey>,
    /// Selected streams by key (`namespace.name` or `name`).
    #[serde(default)]
    pub streams: BTreeMap<String, StreamDirective>,
}

/// A configured replication pipeline from one source service to a
/// destination.
///
/// Soft-deleted links keep their row but are invisible to the dispatcher.
/// Immutable during a run except for checkpoint state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLink {
    pub id: SyncId,
    pub workspace_id: WorkspaceId,
    /// Source service this link reads from.
    pub from_id: ServiceId,
    pub kind: String,
    pub data: LinkData,
    #[serde(default)]
    pub deleted: bool,
}

impl SyncLink {
    /// Whether the dispatcher may run this link.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        !self.deleted && self.kind == SYNC_LINK_KIND
    }
}

/// Source connector configuration: package coordinates plus connection
/// credentials. Referenced (not owned) by sync links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: ServiceId,
    pub workspace_id: WorkspaceId,
    /// Protocol/package identifier, e.g. `"source-postgres"`.
    pub package: String,
    pub version: String,
    /// Connection credentials, opaque to the dispatcher until credential
    /// resolution.
    pub credentials: Value,
}
