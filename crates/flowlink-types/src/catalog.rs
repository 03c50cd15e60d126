//! Stream catalogs and their configured (filtered) form.
//!
//! A [`Catalog`] is the capture of every stream a source package/version
//! exposes, recorded at discovery time. A [`ConfiguredCatalog`] is that
//! capture filtered down to the streams a sync link actually selected,
//! with per-stream sync-mode directives attached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkpoint::StreamDescriptor;
use crate::link::StreamDirective;

/// How data is read from a source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// One-time full read of all records.
    FullRefresh,
    /// Cursor-based incremental reads since the last checkpoint.
    Incremental,
    /// Change data capture via database replication.
    Cdc,
}

/// How configured streams are written downstream. The execution service
/// currently accepts a single mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    #[default]
    Overwrite,
}

/// A discoverable stream as captured at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStream {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// JSON schema of the stream's records, opaque to the dispatcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_sync_modes: Vec<SyncMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_defined_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_defined_primary_key: Option<Vec<String>>,
}

impl CatalogStream {
    /// Selection key: `namespace.name` when namespaced, else `name`.
    #[must_use]
    pub fn key(&self) -> String {
        self.descriptor().key()
    }

    /// Descriptor for checkpoint correlation.
    #[must_use]
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Every stream a source package/version exposes, keyed in storage by
/// `(storage_key, package, version)`. Immutable once stored for a key triple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogStream>,
}

/// One selected stream with its directive fields, as sent downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: CatalogStream,
    pub destination_sync_mode: DestinationSyncMode,
    pub sync_mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
}

/// Catalog filtered to the streams a sync selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    pub streams: Vec<ConfiguredStream>,
}

impl ConfiguredCatalog {
    /// Filter `catalog` down to the streams present in `selection`.
    ///
    /// Streams absent from `selection` are dropped: un-selected streams are
    /// never replicated. Output preserves catalog iteration order, not
    /// selection order.
    #[must_use]
    pub fn select(catalog: &Catalog, selection: &BTreeMap<String, StreamDirective>) -> Self {
        let streams = catalog
            .streams
            .iter()
            .filter_map(|stream| {
                selection.get(&stream.key()).map(|directive| ConfiguredStream {
                    stream: stream.clone(),
                    destination_sync_mode: DestinationSyncMode::Overwrite,
                    sync_mode: directive.sync_mode,
                    cursor_field: directive.cursor_field.clone(),
                    primary_key: directive.primary_key.clone(),
                })
            })
            .collect();
        Self { streams }
    }
}
