// SPDX-License-Identifier: MPL-2.0

use crate::api::Coordinates;
use crate::store::{MirrorDb, StoreError};
use rusqlite::params;

/// A submission that has not reached the server yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewPendingUpload {
    pub description: String,
    /// Photo as a data URL, see `PhotoFile::to_data_url`
    pub photo: String,
    pub location: Option<Coordinates>,
    /// Submission time, unix milliseconds
    pub timestamp: i64,
}

/// A queued submission with its local sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub id: i64,
    pub description: String,
    pub photo: String,
    pub location: Option<Coordinates>,
    pub timestamp: i64,
}

/// Queue of offline submissions, drained in insertion order
pub struct PendingStore<'a> {
    db: &'a MirrorDb,
}

impl<'a> PendingStore<'a> {
    pub fn new(db: &'a MirrorDb) -> Self {
        Self { db }
    }

    /// Append to the queue, returns the assigned sequence number
    pub fn add(&self, upload: &NewPendingUpload) -> Result<i64, StoreError> {
        let conn = self.db.conn();

        conn.execute(
            r#"
            INSERT INTO pending_uploads (description, photo, lat, lon, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                upload.description,
                upload.photo,
                upload.location.map(|c| c.lat),
                upload.location.map(|c| c.lon),
                upload.timestamp,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Oldest first
    pub fn all(&self) -> Result<Vec<PendingUpload>, StoreError> {
        let conn = self.db.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, description, photo, lat, lon, timestamp
            FROM pending_uploads
            ORDER BY id ASC
            "#,
        )?;

        let uploads = stmt
            .query_map([], Self::row_to_upload)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(uploads)
    }

    pub fn get(&self, id: i64) -> Result<PendingUpload, StoreError> {
        let conn = self.db.conn();

        conn.query_row(
            r#"
            SELECT id, description, photo, lat, lon, timestamp
            FROM pending_uploads
            WHERE id = ?
            "#,
            [id],
            Self::row_to_upload,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Database(other),
        })
    }

    /// Returns whether a row was removed
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.db.conn();
        let removed = conn.execute("DELETE FROM pending_uploads WHERE id = ?", [id])?;
        Ok(removed > 0)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.db.conn();
        conn.execute("DELETE FROM pending_uploads", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.db.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM pending_uploads", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_upload(row: &rusqlite::Row) -> Result<PendingUpload, rusqlite::Error> {
        Ok(PendingUpload {
            id: row.get(0)?,
            description: row.get(1)?,
            photo: row.get(2)?,
            location: Coordinates::from_parts(row.get(3)?, row.get(4)?),
            timestamp: row.get(5)?,
        })
    }
}
