// SPDX-License-Identifier: MPL-2.0

mod layer;
mod offline;
mod storage;

pub use layer::{CacheLayer, ControllerChange, Lifecycle, Policy, Scope};
pub use offline::offline_response;
pub use storage::CacheStorage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache path error: {0}")]
    Path(String),
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
    #[error("failed to cache {url}: {reason}")]
    Install { url: String, reason: String },
    #[error("cannot activate from state {0:?}")]
    NotInstalled(Lifecycle),
}
