//! Durable key/value backends.
//!
//! Every persisted collection lives under a single string key as one JSON
//! document. Backends only move raw text around; encoding and the fail-soft
//! read policy live in [`json`].

use async_trait::async_trait;
use thiserror::Error;

pub mod file;
pub mod json;
pub mod memory;

pub use file::FileStore;
pub use json::{read_json, write_json};
pub use memory::MemoryStore;

/// Storage keys, one per persisted collection.
pub mod keys {
    pub const LIBRARIES: &str = "libraries";
    pub const SEARCH_HISTORY: &str = "searchHistory";
    pub const FAVOURITES: &str = "ws:favourites";
    pub const RECENTS: &str = "ws:recents";

    pub const ALL: [&str; 4] = [LIBRARIES, SEARCH_HISTORY, FAVOURITES, RECENTS];
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage lock failed: {0}")]
    Lock(String),
}

/// A durable string-keyed store of JSON text.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when nothing has been stored under `key`.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
