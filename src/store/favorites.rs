// SPDX-License-Identifier: MPL-2.0

use crate::api::Story;
use crate::store::{MirrorDb, StoreError};
use rusqlite::params;

/// Favorites are snapshots: later edits to the story never reach them.
pub struct FavoriteStore<'a> {
    db: &'a MirrorDb,
}

impl<'a> FavoriteStore<'a> {
    pub fn new(db: &'a MirrorDb) -> Self {
        Self { db }
    }

    /// Add or refresh the snapshot for `story.id`; repeat calls keep one record
    pub fn put(&self, story: &Story) -> Result<(), StoreError> {
        let conn = self.db.conn();

        conn.execute(
            r#"
            INSERT INTO favorites (
                id, name, description, photo_url, created_at, lat, lon, favorited_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                photo_url = excluded.photo_url,
                created_at = excluded.created_at,
                lat = excluded.lat,
                lon = excluded.lon
            "#,
            params![
                story.id,
                story.name,
                story.description,
                story.photo_url,
                story.created_at,
                story.location.map(|c| c.lat),
                story.location.map(|c| c.lon),
                MirrorDb::now_millis(),
            ],
        )?;

        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.db.conn();
        conn.execute("DELETE FROM favorites WHERE id = ?", [id])?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Story, StoreError> {
        let conn = self.db.conn();

        conn.query_row(
            r#"
            SELECT id, name, description, photo_url, created_at, lat, lon
            FROM favorites
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

    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT 1 FROM favorites WHERE id = ?")?;
        Ok(stmt.exists([id])?)
    }

    /// Oldest favorite first
    pub fn all(&self) -> Result<Vec<Story>, StoreError> {
        let conn = self.db.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, description, photo_url, created_at, lat, lon
            FROM favorites
            ORDER BY favorited_at ASC, id ASC
            "#,
        )?;

        let favorites = stmt
            .query_map([], MirrorDb::row_to_story)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(favorites)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.db.conn();
        conn.execute("DELETE FROM favorites", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoryStore;
    use crate::testing::{story, temp_mirror};

    #[test]
    fn test_add_twice_keeps_one_record() {
        let (_dir, db) = temp_mirror();
        let favorites = FavoriteStore::new(&db);

        favorites.put(&story("a")).unwrap();
        favorites.put(&story("a")).unwrap();

        assert_eq!(favorites.all().unwrap().len(), 1);
        assert!(favorites.contains("a").unwrap());
    }

    #[test]
    fn test_favorite_is_a_snapshot() {
        let (_dir, db) = temp_mirror();
        let favorites = FavoriteStore::new(&db);
        let stories = StoryStore::new(&db);

        let mut original = story("a");
        stories.put(&original).unwrap();
        favorites.put(&original).unwrap();

        original.description = "changed on the server".into();
        stories.replace_all(&[original]).unwrap();

        assert_eq!(favorites.get("a").unwrap().description, "story a");
    }

    #[test]
    fn test_favorites_survive_story_mirror_clear() {
        let (_dir, db) = temp_mirror();
        FavoriteStore::new(&db).put(&story("a")).unwrap();
        StoryStore::new(&db).clear().unwrap();

        assert!(FavoriteStore::new(&db).contains("a").unwrap());
    }

    #[test]
    fn test_remove() {
        let (_dir, db) = temp_mirror();
        let favorites = FavoriteStore::new(&db);

        favorites.put(&story("a")).unwrap();
        favorites.remove("a").unwrap();
        favorites.remove("a").unwrap();

        assert!(!favorites.contains("a").unwrap());
        assert!(matches!(favorites.get("a"), Err(StoreError::NotFound)));
    }
}
