//! `SQLite`-backed implementation of [`ConfigStore`] and [`StateBackend`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. JSON-valued columns
//! (link data, credentials, catalogs, state blobs) are stored as TEXT.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::Value;

use flowlink_types::catalog::Catalog;
use flowlink_types::ids::{ServiceId, StorageKey, SyncId, TaskId, WorkspaceId};
use flowlink_types::link::{LinkData, ServiceConfig, SyncLink};
use flowlink_types::task::{Task, TaskStatus};

use crate::backend::{ConfigStore, StateBackend, StateRow};
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for all tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS sync_links (
    id TEXT NOT NULL,
    workspace_id TEXT NOT NULL,
    from_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    data TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (workspace_id, id)
);

CREATE TABLE IF NOT EXISTS service_configs (
    id TEXT NOT NULL,
    workspace_id TEXT NOT NULL,
    package TEXT NOT NULL,
    version TEXT NOT NULL,
    credentials TEXT NOT NULL,
    PRIMARY KEY (workspace_id, id)
);

CREATE TABLE IF NOT EXISTS sync_state (
    sync_id TEXT NOT NULL,
    stream TEXT NOT NULL,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (sync_id, stream)
);

CREATE TABLE IF NOT EXISTS catalogs (
    storage_key TEXT NOT NULL,
    package TEXT NOT NULL,
    version TEXT NOT NULL,
    catalog TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (storage_key, package, version)
);

CREATE TABLE IF NOT EXISTS sync_tasks (
    id TEXT PRIMARY KEY,
    sync_id TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_sync_tasks_sync_status ON sync_tasks (sync_id, status);
";

/// `SQLite`-backed storage.
///
/// Create with [`SqliteStateBackend::open`] for file-backed persistence or
/// [`SqliteStateBackend::in_memory`] for tests.
pub struct SqliteStateBackend {
    conn: Mutex<Connection>,
}

impl SqliteStateBackend {
    /// Open or create a `SQLite` database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created, or
    /// [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory backend (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Convert a `SQLite` datetime string to ISO-8601.
    fn sqlite_to_iso8601(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    /// Convert an ISO-8601 string to `SQLite` datetime format.
    fn iso8601_to_sqlite(iso: &str) -> String {
        chrono::DateTime::parse_from_rfc3339(iso).map_or_else(
            |_| iso.to_string(),
            |dt| dt.format(SQLITE_DATETIME_FMT).to_string(),
        )
    }

    fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        let id: String = row.get(0)?;
        let sync_id: String = row.get(1)?;
        let status_raw: String = row.get(2)?;
        let started_at: String = row.get(3)?;
        let finished_at: Option<String> = row.get(4)?;
        let error_message: Option<String> = row.get(5)?;
        let status = TaskStatus::parse(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown task status '{status_raw}'").into(),
            )
        })?;
        Ok(Task {
            id: TaskId::new(id),
            sync_id: SyncId::new(sync_id),
            status,
            started_at: Self::sqlite_to_iso8601(&started_at),
            finished_at: finished_at.as_deref().map(Self::sqlite_to_iso8601),
            error_message,
        })
    }

    #[cfg(test)]
    fn count_state_rows(&self, sync: &SyncId) -> error::Result<i64> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM sync_state WHERE sync_id = ?1",
            [sync.as_str()],
            |row| row.get(0),
        )?)
    }

    #[cfg(test)]
    fn get_task_row(&self, task: &TaskId) -> error::Result<(String, Option<String>)> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row(
            "SELECT status, error_message FROM sync_tasks WHERE id = ?1",
            [task.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }
}

impl ConfigStore for SqliteStateBackend {
    fn get_sync_link(
        &self,
        workspace: &WorkspaceId,
        sync: &SyncId,
    ) -> error::Result<Option<SyncLink>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT from_id, kind, data, deleted FROM sync_links \
             WHERE workspace_id = ?1 AND id = ?2",
            rusqlite::params![workspace.as_str(), sync.as_str()],
            |row| {
                let from_id: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let data: String = row.get(2)?;
                let deleted: bool = row.get(3)?;
                Ok((from_id, kind, data, deleted))
            },
        );

        match result {
            Ok((from_id, kind, data, deleted)) => {
                let data: LinkData = serde_json::from_str(&data)
                    .map_err(|e| StateError::corrupt("sync_links", e))?;
                Ok(Some(SyncLink {
                    id: sync.clone(),
                    workspace_id: workspace.clone(),
                    from_id: ServiceId::new(from_id),
                    kind,
                    data,
                    deleted,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_service_config(
        &self,
        workspace: &WorkspaceId,
        service: &ServiceId,
    ) -> error::Result<Option<ServiceConfig>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT package, version, credentials FROM service_configs \
             WHERE workspace_id = ?1 AND id = ?2",
            rusqlite::params![workspace.as_str(), service.as_str()],
            |row| {
                let package: String = row.get(0)?;
                let version: String = row.get(1)?;
                let credentials: String = row.get(2)?;
                Ok((package, version, credentials))
            },
        );

        match result {
            Ok((package, version, credentials)) => {
                let credentials: Value = serde_json::from_str(&credentials)
                    .map_err(|e| StateError::corrupt("service_configs", e))?;
                Ok(Some(ServiceConfig {
                    id: service.clone(),
                    workspace_id: workspace.clone(),
                    package,
                    version,
                    credentials,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_sync_link(&self, link: &SyncLink) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let data = serde_json::to_string(&link.data)
            .map_err(|e| StateError::corrupt("sync_links", e))?;
        conn.execute(
            "INSERT INTO sync_links (id, workspace_id, from_id, kind, data, deleted) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(workspace_id, id) \
             DO UPDATE SET from_id = ?3, kind = ?4, data = ?5, deleted = ?6",
            rusqlite::params![
                link.id.as_str(),
                link.workspace_id.as_str(),
                link.from_id.as_str(),
                link.kind,
                data,
                link.deleted,
            ],
        )?;
        Ok(())
    }

    fn put_service_config(&self, config: &ServiceConfig) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let credentials = serde_json::to_string(&config.credentials)
            .map_err(|e| StateError::corrupt("service_configs", e))?;
        conn.execute(
            "INSERT INTO service_configs (id, workspace_id, package, version, credentials) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(workspace_id, id) \
             DO UPDATE SET package = ?3, version = ?4, credentials = ?5",
            rusqlite::params![
                config.id.as_str(),
                config.workspace_id.as_str(),
                config.package,
                config.version,
                credentials,
            ],
        )?;
        Ok(())
    }
}

impl StateBackend for SqliteStateBackend {
    fn list_state(&self, sync: &SyncId) -> error::Result<Vec<StateRow>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT stream, state FROM sync_state WHERE sync_id = ?1 ORDER BY stream",
        )?;
        let rows = stmt.query_map([sync.as_str()], |row| {
            let stream: String = row.get(0)?;
            let state: String = row.get(1)?;
            Ok((stream, state))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (stream, state) = row?;
            let state: Value = serde_json::from_str(&state)
                .map_err(|e| StateError::corrupt("sync_state", e))?;
            out.push(StateRow { stream, state });
        }
        Ok(out)
    }

    fn put_state(&self, sync: &SyncId, stream: &str, state: &Value) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let state = serde_json::to_string(state)
            .map_err(|e| StateError::corrupt("sync_state", e))?;
        conn.execute(
            "INSERT INTO sync_state (sync_id, stream, state, updated_at) \
             VALUES (?1, ?2, ?3, datetime('now')) \
             ON CONFLICT(sync_id, stream) \
             DO UPDATE SET state = ?3, updated_at = datetime('now')",
            rusqlite::params![sync.as_str(), stream, state],
        )?;
        Ok(())
    }

    fn clear_state(&self, sync: &SyncId) -> error::Result<u64> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM sync_state WHERE sync_id = ?1",
            [sync.as_str()],
        )?;
        Ok(removed as u64)
    }

    fn get_catalog(
        &self,
        key: &StorageKey,
        package: &str,
        version: &str,
    ) -> error::Result<Option<Catalog>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT catalog FROM catalogs \
             WHERE storage_key = ?1 AND package = ?2 AND version = ?3",
            rusqlite::params![key.as_str(), package, version],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(raw) => {
                let catalog: Catalog = serde_json::from_str(&raw)
                    .map_err(|e| StateError::corrupt("catalogs", e))?;
                Ok(Some(catalog))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_catalog(
        &self,
        key: &StorageKey,
        package: &str,
        version: &str,
        catalog: &Catalog,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        let raw = serde_json::to_string(catalog)
            .map_err(|e| StateError::corrupt("catalogs", e))?;
        conn.execute(
            "INSERT INTO catalogs (storage_key, package, version, catalog, created_at) \
             VALUES (?1, ?2, ?3, ?4, datetime('now')) \
             ON CONFLICT(storage_key, package, version) DO UPDATE SET catalog = ?4",
            rusqlite::params![key.as_str(), package, version, raw],
        )?;
        Ok(())
    }

    fn running_task(&self, sync: &SyncId) -> error::Result<Option<Task>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT id, sync_id, status, started_at, finished_at, error_message \
             FROM sync_tasks WHERE sync_id = ?1 AND status = 'running' \
             ORDER BY started_at DESC LIMIT 1",
            [sync.as_str()],
            Self::task_from_row,
        );

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_task(&self, task: &Task) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_tasks (id, sync_id, status, started_at) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                task.id.as_str(),
                task.sync_id.as_str(),
                task.status.as_str(),
                Self::iso8601_to_sqlite(&task.started_at),
            ],
        )?;
        Ok(())
    }

    fn complete_task(
        &self,
        task: &TaskId,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE sync_tasks SET status = ?1, finished_at = datetime('now'), \
             error_message = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), error_message, task.as_str()],
        )?;
        Ok(())
    }
}
