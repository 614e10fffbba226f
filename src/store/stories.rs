// SPDX-License-Identifier: MPL-2.0

use crate::api::Story;
use crate::store::{MirrorDb, StoreError};
use rusqlite::params;

const UPSERT_STORY: &str = r#"
    INSERT INTO stories (
        id, name, description, photo_url, created_at, lat, lon, position, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        description = excluded.description,
        photo_url = excluded.photo_url,
        created_at = excluded.created_at,
        lat = excluded.lat,
        lon = excluded.lon,
        stored_at = excluded.stored_at
"#;

/// Mirror of server stories
pub struct StoryStore<'a> {
    db: &'a MirrorDb,
}

impl<'a> StoryStore<'a> {
    pub fn new(db: &'a MirrorDb) -> Self {
        Self { db }
    }

    /// Store a single story (upserts, keeps its list position)
    pub fn put(&self, story: &Story) -> Result<(), StoreError> {
        let conn = self.db.conn();

        let next_position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM stories",
            [],
            |row| row.get(0),
        )?;

        conn.execute(
            UPSERT_STORY,
            params![
                story.id,
                story.name,
                story.description,
                story.photo_url,
                story.created_at,
                story.location.map(|c| c.lat),
                story.location.map(|c| c.lon),
                next_position,
                MirrorDb::now_millis(),
            ],
        )?;

        Ok(())
    }

    /// Replace the whole family with `stories`, in one transaction.
    ///
    /// No merge: anything not in `stories` is gone afterwards.
    pub fn replace_all(&self, stories: &[Story]) -> Result<(), StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let now = MirrorDb::now_millis();

        tx.execute("DELETE FROM stories", [])?;

        for (position, story) in stories.iter().enumerate() {
            tx.execute(
                UPSERT_STORY,
                params![
                    story.id,
                    story.name,
                    story.description,
                    story.photo_url,
                    story.created_at,
                    story.location.map(|c| c.lat),
                    story.location.map(|c| c.lon),
                    position as i64,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Story, StoreError> {
        let conn = self.db.conn();

        conn.query_row(
            r#"
            SELECT id, name, description, photo_url, created_at, lat, lon
            FROM stories
            WHERE id = ?
            "#,
            [id],
            MirrorDb::row_to_story,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Database(other),
        })
    }

    /// All mirrored stories in the order the server listed them
    pub fn all(&self) -> Result<Vec<Story>, StoreError> {
        let conn = self.db.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, description, photo_url, created_at, lat, lon
            FROM stories
            ORDER BY position ASC
            "#,
        )?;

        let stories = stmt
            .query_map([], MirrorDb::row_to_story)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stories)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.db.conn();
        conn.execute("DELETE FROM stories WHERE id = ?", [id])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.db.conn();
        conn.execute("DELETE FROM stories", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.db.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
