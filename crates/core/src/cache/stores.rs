//! Named cache stores and their snapshots.
//!
//! A store is identified by its name (which embeds the deployment version)
//! and maps request keys to response snapshots. Writes overwrite in place;
//! there are no timestamps driving expiry, only whole-store deletion.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::request_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// An immutable capture of a prior network response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Snapshot {
    /// Hash of method + normalized URL, see [`super::hash::compute_request_key`].
    pub request_key: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl Snapshot {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Row shape before the header map is decoded.
struct EntryRow {
    request_key: String,
    method: String,
    url: String,
    status_code: i64,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            request_key: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            status_code: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
            stored_at: row.get(6)?,
        })
    }

    fn into_snapshot(self) -> Result<Snapshot, Error> {
        let status_code = u16::try_from(self.status_code)
            .map_err(|_| Error::Serialization(format!("status code out of range: {}", self.status_code)))?;
        Ok(Snapshot {
            request_key: self.request_key,
            method: self.method,
            url: self.url,
            status_code,
            headers: serde_json::from_str(&self.headers_json)?,
            body: self.body,
            stored_at: self.stored_at,
        })
    }
}

const SELECT_ENTRY: &str = "SELECT request_key, method, url, status_code, headers_json, body, stored_at
     FROM entries WHERE store = ?1 AND request_key = ?2";

fn ensure_store(conn: &rusqlite::Connection, name: &str) -> Result<bool, Error> {
    let created = conn.execute(
        "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(created == 1)
}

fn upsert_entry(conn: &rusqlite::Connection, store: &str, snapshot: &Snapshot) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&snapshot.headers)?;
    conn.execute(
        "INSERT INTO entries (store, request_key, method, url, status_code, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(store, request_key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status_code = excluded.status_code,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            store,
            &snapshot.request_key,
            &snapshot.method,
            &snapshot.url,
            snapshot.status_code as i64,
            headers_json,
            &snapshot.body,
            &snapshot.stored_at,
        ],
    )?;
    Ok(())
}

fn select_entry(conn: &rusqlite::Connection, store: &str, request_key: &str) -> Result<Option<Snapshot>, Error> {
    let mut stmt = conn.prepare_cached(SELECT_ENTRY)?;
    match stmt.query_row(params![store, request_key], EntryRow::from_row) {
        Ok(row) => row.into_snapshot().map(Some),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl CacheDb {
    /// Open a store, creating it if absent.
    ///
    /// Returns true if the store was created by this call.
    pub async fn open_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { ensure_store(conn, &name) })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every existing store, sorted.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if the store did not exist.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite one snapshot, creating the store if needed.
    pub async fn put_entry(&self, store: &str, snapshot: &Snapshot) -> Result<(), Error> {
        let store = store.to_string();
        let snapshot = snapshot.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store)?;
                upsert_entry(&tx, &store, &snapshot)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of snapshots in one transaction.
    ///
    /// Either every snapshot lands or none does; the store is created as
    /// part of the same transaction.
    pub async fn put_entries(&self, store: &str, snapshots: Vec<Snapshot>) -> Result<(), Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store)?;
                for snapshot in &snapshots {
                    upsert_entry(&tx, &store, snapshot)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a snapshot from one store.
    pub async fn get_entry(&self, store: &str, request_key: &str) -> Result<Option<Snapshot>, Error> {
        let store = store.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> { select_entry(conn, &store, &request_key) })
            .await
            .map_err(Error::from)
    }

    /// Look a request key up across several stores.
    ///
    /// Stores are consulted in the given order; the first hit wins and is
    /// returned with the name of the store it came from.
    pub async fn match_entry(&self, stores: &[String], request_key: &str) -> Result<Option<(String, Snapshot)>, Error> {
        let stores = stores.to_vec();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<(String, Snapshot)>, Error> {
                for store in stores {
                    if let Some(snapshot) = select_entry(conn, &store, &request_key)? {
                        return Ok(Some((store, snapshot)));
                    }
                }
                Ok(None)
            })
            .await
            .map_err(Error::from)
    }

    /// Readable keys (`METHOD url`) of every entry in a store, sorted by URL.
    pub async fn entry_keys(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE store = ?1 ORDER BY url, method")?;
                let keys = stmt
                    .query_map(params![store], |row| {
                        let method: String = row.get(0)?;
                        let url: String = row.get(1)?;
                        Ok(request_key(&method, &url))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop the entries table so every later read and write fails.
    #[cfg(any(test, feature = "testing"))]
    pub async fn break_entries(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute_batch("DROP TABLE entries")?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_entries(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE store = ?1", params![store], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash::compute_request_key;

    fn make_test_snapshot(url: &str, body: &str) -> Snapshot {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        Snapshot {
            request_key: compute_request_key("GET", url),
            method: "GET".to_string(),
            url: url.to_string(),
            status_code: 200,
            headers,
            body: body.as_bytes().to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let snapshot = make_test_snapshot("https://example.com/", "<h1>home</h1>");

        db.put_entry("app-runtime-v1", &snapshot).await.unwrap();

        let retrieved = db.get_entry("app-runtime-v1", &snapshot.request_key).await.unwrap().unwrap();
        assert_eq!(retrieved, snapshot);
        assert_eq!(retrieved.content_type(), Some("text/html"));
        assert!(db.has_store("app-runtime-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get_entry("app-runtime-v1", "nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_is_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = make_test_snapshot("https://example.com/a", "first");
        let second = make_test_snapshot("https://example.com/a", "second");

        db.put_entry("s", &first).await.unwrap();
        db.put_entry("s", &second).await.unwrap();

        assert_eq!(db.count_entries("s").await.unwrap(), 1);
        let retrieved = db.get_entry("s", &first.request_key).await.unwrap().unwrap();
        assert_eq!(retrieved.body, b"second");
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let snapshot = make_test_snapshot("https://example.com/a", "a");
        db.put_entry("one", &snapshot).await.unwrap();

        assert!(db.get_entry("two", &snapshot.request_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_entries_all_or_nothing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let batch = vec![
            make_test_snapshot("https://example.com/", "home"),
            make_test_snapshot("https://example.com/offline.html", "offline"),
        ];

        db.put_entries("app-v1", batch).await.unwrap();
        assert_eq!(db.count_entries("app-v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_store_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let snapshot = make_test_snapshot("https://example.com/", "home");
        db.put_entry("app-v0", &snapshot).await.unwrap();

        assert!(db.delete_store("app-v0").await.unwrap());
        assert!(!db.delete_store("app-v0").await.unwrap());
        assert!(!db.has_store("app-v0").await.unwrap());
        assert_eq!(db.count_entries("app-v0").await.unwrap(), 0);

        db.open_store("app-v0").await.unwrap();
        assert!(db.get_entry("app-v0", &snapshot.request_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_names_sorted() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.open_store("b").await.unwrap());
        assert!(db.open_store("a").await.unwrap());
        assert!(!db.open_store("a").await.unwrap());

        assert_eq!(db.store_names().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_match_entry_respects_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let precached = make_test_snapshot("https://example.com/", "precached");
        let runtime = make_test_snapshot("https://example.com/", "runtime");
        db.put_entry("app-v1", &precached).await.unwrap();

        let order = vec!["app-runtime-v1".to_string(), "app-v1".to_string()];
        let (store, hit) = db.match_entry(&order, &precached.request_key).await.unwrap().unwrap();
        assert_eq!(store, "app-v1");
        assert_eq!(hit.body, b"precached");

        db.put_entry("app-runtime-v1", &runtime).await.unwrap();
        let (store, hit) = db.match_entry(&order, &precached.request_key).await.unwrap().unwrap();
        assert_eq!(store, "app-runtime-v1");
        assert_eq!(hit.body, b"runtime");
    }

    #[tokio::test]
    async fn test_entry_keys_sorted_by_url() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("s", &make_test_snapshot("https://example.com/b", "b")).await.unwrap();
        db.put_entry("s", &make_test_snapshot("https://example.com/a", "a")).await.unwrap();

        assert_eq!(
            db.entry_keys("s").await.unwrap(),
            vec!["GET https://example.com/a".to_string(), "GET https://example.com/b".to_string()]
        );
        assert!(db.entry_keys("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_entries_table_fails_reads_and_writes() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let snapshot = make_test_snapshot("https://example.com/", "home");
        db.break_entries().await.unwrap();

        assert!(matches!(db.put_entry("s", &snapshot).await, Err(Error::Database(_))));
        assert!(db.get_entry("s", &snapshot.request_key).await.is_err());
    }
}
