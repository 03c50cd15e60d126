//! Replication checkpoint state.
//!
//! Three wire encodings persist in storage, all keyed by `(sync_id, stream)`:
//! a single legacy blob row, a single global row, or any number of per-stream
//! rows. [`CheckpointState`] is the canonical in-memory form; decoding from
//! rows lives with the storage adapter, encoding to the dispatch request body
//! lives here.
//!
//! The three forms are mutually exclusive for a sync at rest. That invariant
//! is held by the writers, not re-checked on every load.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved row key for the legacy single-blob encoding.
pub const LEGACY_STATE_KEY: &str = "_LEGACY_STATE";

/// Reserved row key for the global encoding.
pub const GLOBAL_STATE_KEY: &str = "_GLOBAL_STATE";

/// A stream key that is neither a sentinel nor `name` / `namespace.name`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stream key '{key}': expected 'name' or 'namespace.name'")]
pub struct InvalidStreamKey {
    /// The offending persisted key.
    pub key: String,
}

/// Identifies a stream within a source, optionally namespaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl StreamDescriptor {
    /// Descriptor without a namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Descriptor qualified by a namespace.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Parse a persisted stream key: `name` or `namespace.name`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStreamKey`] for empty keys or keys with more than
    /// one `.` separator.
    pub fn parse_key(key: &str) -> Result<Self, InvalidStreamKey> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(Self::new(*name)),
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::namespaced(*namespace, *name))
            }
            _ => Err(InvalidStreamKey {
                key: key.to_string(),
            }),
        }
    }

    /// Row/selection key: `namespace.name` when namespaced, else `name`.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Checkpoint for one stream in the per-stream encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub descriptor: StreamDescriptor,
    pub state: Value,
}

/// Canonical in-memory replication progress for a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointState {
    /// Opaque blob carried over from the legacy single-row format, used
    /// verbatim.
    Legacy(Value),
    /// Source-global state, wrapped into a one-element `GLOBAL` list on the
    /// wire.
    Global(Value),
    /// Per-stream state entries, one `STREAM` element each.
    PerStream(Vec<StreamState>),
}

/// One element of the list-shaped wire encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateEntry {
    #[serde(rename = "GLOBAL")]
    Global { global: Value },
    #[serde(rename = "STREAM")]
    Stream { stream: WireStreamState },
}

/// Per-stream entry body as the execution service expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStreamState {
    pub stream_descriptor: StreamDescriptor,
    pub stream_state: Value,
}

impl CheckpointState {
    /// Encode for the dispatch request `state` field.
    ///
    /// Legacy state is the raw blob; global and per-stream become tagged
    /// lists.
    #[must_use]
    pub fn wire_value(&self) -> Value {
        match self {
            Self::Legacy(blob) => blob.clone(),
            Self::Global(blob) => serde_json::json!([StateEntry::Global {
                global: blob.clone()
            }]),
            Self::PerStream(entries) => {
                let wire: Vec<StateEntry> = entries
                    .iter()
                    .map(|entry| StateEntry::Stream {
                        stream: WireStreamState {
                            stream_descriptor: entry.descriptor.clone(),
                            stream_state: entry.state.clone(),
                        },
                    })
                    .collect();
                serde_json::to_value(wire).unwrap_or(Value::Null)
            }
        }
    }
}
