// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the mirror database.
///
/// Every statement is `IF NOT EXISTS` so reopening never truncates a family.
pub const SCHEMA: &str = r#"
PRAGMA user_version = 1;

-- stories: last successful list/detail fetch, replaced wholesale on list fetch
CREATE TABLE IF NOT EXISTS stories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    photo_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    lat REAL,
    lon REAL,
    position INTEGER NOT NULL,
    stored_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stories_created_at ON stories(created_at);

-- favorites: point-in-time story snapshots, same key as the story
CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    photo_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    lat REAL,
    lon REAL,
    favorited_at INTEGER NOT NULL
);

-- pending_uploads: write-ahead records for submissions made while offline
CREATE TABLE IF NOT EXISTS pending_uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    photo TEXT NOT NULL,
    lat REAL,
    lon REAL,
    timestamp INTEGER NOT NULL
);
"#;
