// SPDX-License-Identifier: MPL-2.0

//! Named response caches persisted in SQLite.
//!
//! Each cache partition is a name plus a set of `url -> response` entries.
//! Bodies are stored as blobs alongside status and headers so a hit can be
//! replayed exactly.

use crate::cache::CacheError;
use crate::net::{Response, ResponseSource, StatusCode};
use crate::store::MirrorDb;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use url::Url;

const SCHEMA: &str = r#"
PRAGMA user_version = 1;

CREATE TABLE IF NOT EXISTS caches (
    name TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    cache_name TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers_json TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (cache_name, url)
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const ACTIVE_VERSION_KEY: &str = "active_version";

#[derive(Clone)]
pub struct CacheStorage {
    conn: Arc<Mutex<Connection>>,
}

impl CacheStorage {
    /// Path: {data_dir}/caches.db
    pub fn open(data_dir: &Path) -> Result<Self, CacheError> {
        Self::open_at(&data_dir.join("caches.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Cache names, oldest first
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn has(&self, name: &str) -> Result<bool, CacheError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT 1 FROM caches WHERE name = ?")?;
        Ok(stmt.exists([name])?)
    }

    /// Drop a partition and everything in it. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM entries WHERE cache_name = ?", [name])?;
        let removed = tx.execute("DELETE FROM caches WHERE name = ?", [name])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    pub fn put(&self, name: &str, url: &Url, response: &Response) -> Result<(), CacheError> {
        self.put_all(name, &[(url.clone(), response.duplicate())])
    }

    /// Store every entry or none of them
    pub fn put_all(&self, name: &str, entries: &[(Url, Response)]) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = MirrorDb::now_millis();

        tx.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![name, now],
        )?;

        for (url, response) in entries {
            let headers_json = serde_json::to_string(response.headers())?;
            let body = response.duplicate().bytes();

            tx.execute(
                r#"
                INSERT INTO entries (cache_name, url, status, headers_json, body, stored_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(cache_name, url) DO UPDATE SET
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at
                "#,
                params![
                    name,
                    url.as_str(),
                    response.status().as_u16(),
                    headers_json,
                    body.as_ref(),
                    now
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Look `url` up in a single partition
    pub fn match_in(&self, name: &str, url: &Url) -> Result<Option<Response>, CacheError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                r#"
                SELECT status, headers_json, body FROM entries
                WHERE cache_name = ?1 AND url = ?2
                "#,
                params![name, url.as_str()],
                |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(Self::to_response).transpose()
    }

    /// Look `url` up across every partition, oldest partition first
    pub fn match_any(&self, url: &Url) -> Result<Option<Response>, CacheError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                r#"
                SELECT e.status, e.headers_json, e.body
                FROM entries e
                JOIN caches c ON c.name = e.cache_name
                WHERE e.url = ?1
                ORDER BY c.created_at ASC, c.name ASC
                LIMIT 1
                "#,
                [url.as_str()],
                |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(Self::to_response).transpose()
    }

    pub fn entry_count(&self, name: &str) -> Result<usize, CacheError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE cache_name = ?",
            [name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn active_version(&self) -> Result<Option<String>, CacheError> {
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                [ACTIVE_VERSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_active_version(&self, version: &str) -> Result<(), CacheError> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO meta (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![ACTIVE_VERSION_KEY, version],
        )?;
        Ok(())
    }

    fn to_response(
        (status, headers_json, body): (u16, String, Vec<u8>),
    ) -> Result<Response, CacheError> {
        let status = StatusCode::from_u16(status)
            .map_err(|e| CacheError::Corrupt(format!("bad status {status}: {e}")))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;

        Ok(Response::new(status, body)
            .with_headers(headers)
            .with_source(ResponseSource::Cache))
    }
}
