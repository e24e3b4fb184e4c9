//! Pending deferred task registrations.
//!
//! The application registers a tag when an action cannot complete online.
//! The record survives restarts until a handler run succeeds, and tracks the
//! attempt count the host uses for back-off.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A pending deferred task registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TaskRecord {
    pub tag: String,
    pub registered_at: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<String>,
}

impl TaskRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tag: row.get(0)?,
            registered_at: row.get(1)?,
            attempts: row.get(2)?,
            last_error: row.get(3)?,
            last_attempt_at: row.get(4)?,
        })
    }
}

impl CacheDb {
    /// Register a pending task.
    ///
    /// Registering a tag that is already pending keeps the existing record and
    /// its attempt count. Returns true if the tag was newly registered.
    pub async fn register_task(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO deferred_tasks (tag, registered_at) VALUES (?1, ?2)",
                    params![tag, now],
                )?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn get_task(&self, tag: &str) -> Result<Option<TaskRecord>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Option<TaskRecord>, Error> {
                let result = conn.query_row(
                    "SELECT tag, registered_at, attempts, last_error, last_attempt_at
                     FROM deferred_tasks WHERE tag = ?1",
                    params![tag],
                    TaskRecord::from_row,
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// All pending registrations, oldest first.
    pub async fn pending_tasks(&self) -> Result<Vec<TaskRecord>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<TaskRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT tag, registered_at, attempts, last_error, last_attempt_at
                     FROM deferred_tasks ORDER BY registered_at ASC, tag ASC",
                )?;
                let records = stmt
                    .query_map([], TaskRecord::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed run and return the new attempt count.
    ///
    /// Returns `Error::CacheMiss` if the tag is not pending.
    pub async fn record_task_failure(&self, tag: &str, error: &str) -> Result<u32, Error> {
        let tag = tag.to_string();
        let error = error.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<u32, Error> {
                let updated = conn.execute(
                    "UPDATE deferred_tasks
                     SET attempts = attempts + 1, last_error = ?2, last_attempt_at = ?3
                     WHERE tag = ?1",
                    params![tag, error, now],
                )?;
                if updated == 0 {
                    return Err(Error::CacheMiss(tag));
                }
                let attempts: u32 =
                    conn.query_row("SELECT attempts FROM deferred_tasks WHERE tag = ?1", params![tag], |row| {
                        row.get(0)
                    })?;
                Ok(attempts)
            })
            .await
            .map_err(Error::from)
    }

    /// Clear a pending registration after a successful run.
    ///
    /// Returns false if the tag was not pending.
    pub async fn complete_task(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM deferred_tasks WHERE tag = ?1", params![tag])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }
}
