//! Named cache stores and their entries.
//!
//! A store is a row in `cache_stores`; it springs into existence on the first
//! `put` and disappears, entries included, on `CacheDb::delete_store`.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use super::key::CacheKey;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response.
///
/// Entries are immutable: a later `put` for the same key replaces the whole
/// row, never individual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheEntry {
    /// Build an entry stamped with the current time.
    pub fn new(key: CacheKey, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { key, status, headers, body, stored_at: chrono::Utc::now().to_rfc3339() }
    }
}

/// Handle to one named store.
///
/// Opening a handle touches nothing in the database.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    name: String,
}

impl CacheDb {
    /// Get a handle to the store called `name`.
    pub fn open_store(&self, name: impl Into<String>) -> CacheStore {
        CacheStore { db: self.clone(), name: name.into() }
    }

    /// Names of every store that currently exists.
    pub async fn list_store_names(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a store called `name` exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no such store existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE store_name = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the entry for `key`.
    ///
    /// Returns None on a miss, including when the store doesn't exist yet.
    pub async fn match_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        let name = self.name.clone();
        let key = key.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, headers_json, body, stored_at
                     FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, key.hash()], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                });

                match result {
                    Ok((status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(CacheEntry { key, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the entry for `entry.key`, creating the store if needed.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::InvalidInput("cache store name must not be empty".into()));
        }

        let name = self.name.clone();
        let entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.headers)?;

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (store_name, key_hash, method, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(store_name, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        name,
                        entry.key.hash(),
                        entry.key.method(),
                        entry.key.url(),
                        entry.status,
                        headers_json,
                        entry.body,
                        entry.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for `key`.
    ///
    /// Returns false if there was nothing to remove.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, Error> {
        let name = self.name.clone();
        let hash = key.hash().to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![name, hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the store.
    pub async fn len(&self) -> Result<u64, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Evict the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim(&self, max_entries: usize) -> Result<u64, Error> {
        let name = self.name.clone();
        let max = max_entries as i64;
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash IN (
                        SELECT key_hash FROM cache_entries WHERE store_name = ?1
                        ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                    )",
                    params![name, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, body: &str) -> CacheEntry {
        let key = CacheKey::parse("GET", url).unwrap();
        let headers = vec![("content-type".to_string(), "text/plain".to_string())];
        CacheEntry::new(key, 200, headers, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("edgecache-runtime-v1");
        let stored = entry("https://example.com/app.css", "body { }");

        store.put(&stored).await.unwrap();

        let found = store.match_entry(&stored.key).await.unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("edgecache-runtime-v1");
        let key = CacheKey::parse("GET", "https://example.com/missing").unwrap();
        assert!(store.match_entry(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_created_lazily() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("lazy");
        assert!(!db.has_store("lazy").await.unwrap());
        assert!(db.list_store_names().await.unwrap().is_empty());

        store.put(&entry("https://example.com/", "x")).await.unwrap();
        assert!(db.has_store("lazy").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("runtime");
        store.put(&entry("https://example.com/a", "old")).await.unwrap();
        store.put(&entry("https://example.com/a", "new")).await.unwrap();

        let key = CacheKey::parse("GET", "https://example.com/a").unwrap();
        let found = store.match_entry(&key).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let precache = db.open_store("precache");
        let runtime = db.open_store("runtime");
        let stored = entry("https://example.com/", "home");

        precache.put(&stored).await.unwrap();
        assert!(runtime.match_entry(&stored.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("runtime");
        let stored = entry("https://example.com/a", "a");
        store.put(&stored).await.unwrap();

        assert!(store.delete(&stored.key).await.unwrap());
        assert!(!store.delete(&stored.key).await.unwrap());
        assert!(store.match_entry(&stored.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_store_removes_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("v1-static");
        let stored = entry("https://example.com/a", "a");
        store.put(&stored).await.unwrap();

        assert!(db.delete_store("v1-static").await.unwrap());
        assert!(!db.delete_store("v1-static").await.unwrap());
        assert!(store.match_entry(&stored.key).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_store_names() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["v1-static", "v2-static", "v1-runtime"] {
            db.open_store(name).put(&entry("https://example.com/", "x")).await.unwrap();
        }

        let names: Vec<String> = db.list_store_names().await.unwrap().into_iter().collect();
        assert_eq!(names, vec!["v1-runtime", "v1-static", "v2-static"]);
    }

    #[tokio::test]
    async fn test_trim_evicts_oldest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("runtime");
        for (i, stamp) in ["2024-01-01T00:00:00+00:00", "2024-01-02T00:00:00+00:00", "2024-01-03T00:00:00+00:00"]
            .iter()
            .enumerate()
        {
            let mut stored = entry(&format!("https://example.com/{i}"), "x");
            stored.stored_at = stamp.to_string();
            store.put(&stored).await.unwrap();
        }

        let deleted = store.trim(2).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.len().await.unwrap(), 2);

        let oldest = CacheKey::parse("GET", "https://example.com/0").unwrap();
        assert!(store.match_entry(&oldest).await.unwrap().is_none());
        assert_eq!(store.trim(5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_rejects_empty_store_name() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.open_store("").put(&entry("https://example.com/", "x")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
