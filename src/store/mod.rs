// SPDX-License-Identifier: MPL-2.0

//! Local mirror store: durable copies of server stories, favorites, and
//! story submissions still waiting to reach the server.

mod db;
mod favorites;
mod pending;
mod schema;
mod stories;

pub use db::MirrorDb;
pub use favorites::FavoriteStore;
pub use pending::{NewPendingUpload, PendingStore, PendingUpload};
pub use stories::StoryStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found")]
    NotFound,
    #[error("database path error: {0}")]
    Path(String),
    #[error("store task failed: {0}")]
    Task(String),
}
