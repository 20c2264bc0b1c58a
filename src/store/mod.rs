//! Observable collection stores.
//!
//! Each store owns one collection persisted under a single key. Observers
//! `subscribe` for change notifications and read cached snapshots; mutations
//! go through the store's typed actions.

use thiserror::Error;

use crate::storage::StorageError;

pub mod clock;
pub mod observable;
pub mod history;
pub mod libraries;
pub mod listeners;

pub use clock::{Clock, ManualClock, SystemClock};
pub use history::{normalize_query, SearchHistoryActions, SearchHistorySnapshot, SearchHistoryStore, MAX_HISTORY_ITEMS};
pub use libraries::{LibrariesSnapshot, LibraryActions, LibraryStore, DEFAULT_LIBRARY_NAME};
pub use listeners::{Listener, Subscription};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("store has been dropped")]
    Closed,
}
