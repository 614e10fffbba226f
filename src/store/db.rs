// SPDX-License-Identifier: MPL-2.0

use crate::api::{Coordinates, Story};
use crate::store::StoreError;
use crate::store::schema::SCHEMA;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Handle to the mirror database.
///
/// Opened once at startup and cloned into every component that needs it.
#[derive(Clone)]
pub struct MirrorDb {
    conn: Arc<Mutex<Connection>>,
}

impl MirrorDb {
    /// Open or create the mirror under the data directory
    /// Path: {data_dir}/mirror.db
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        Self::open_at(&Self::mirror_path(data_dir))
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Path(format!("failed to create data dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;

        info!(path = %path.display(), "mirror store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn mirror_path(data_dir: &Path) -> PathBuf {
        data_dir.join("mirror.db")
    }

    /// Access connection for operations
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Run store work on the blocking pool so async callers never wait on
    /// SQLite from a runtime worker
    pub async fn run<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&MirrorDb) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Current unix time in milliseconds
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Columns shared by `stories` and `favorites`, in SELECT order:
    /// id, name, description, photo_url, created_at, lat, lon
    pub(crate) fn row_to_story(row: &rusqlite::Row) -> Result<Story, rusqlite::Error> {
        let lat: Option<f64> = row.get(5)?;
        let lon: Option<f64> = row.get(6)?;

        Ok(Story {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            photo_url: row.get(3)?,
            created_at: row.get(4)?,
            location: Coordinates::from_parts(lat, lon),
        })
    }
}
