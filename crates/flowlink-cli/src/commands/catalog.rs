use std::path::Path;

use anyhow::{Context, Result};

use flowlink_state::StateBackend;
use flowlink_types::catalog::Catalog;
use flowlink_types::ids::StorageKey;

/// Execute `catalog import`: store a captured catalog JSON file under a
/// `(storage key, package, version)` triple.
pub fn import(storage_key: &str, package: &str, version: &str, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let catalog: Catalog = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid catalog JSON in {}", file.display()))?;

    let backend = super::open_backend()?;
    backend.put_catalog(&StorageKey::new(storage_key), package, version, &catalog)?;

    println!(
        "Stored catalog with {} stream(s) for ({storage_key}, {package}, {version}).",
        catalog.streams.len()
    );
    Ok(())
}
