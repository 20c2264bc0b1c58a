use std::sync::Arc;

use super::clock::SystemClock;
use super::listeners::Subscription;
use super::observable::{Collection, Handle, StoreCore, View};
use super::StoreError;
use crate::storage::{keys, KeyValueStore};

/// Most queries kept in the search history.
pub const MAX_HISTORY_ITEMS: usize = 12;

/// Trims and collapses inner whitespace runs to a single space.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct SearchHistorySnapshot {
    pub hydrated: bool,
    pub version: u64,
    /// Most recent first.
    pub items: Arc<Vec<String>>,
    actions: SearchHistoryActions,
}

impl SearchHistorySnapshot {
    pub fn actions(&self) -> &SearchHistoryActions {
        &self.actions
    }
}

impl Collection for Vec<String> {
    // Non-string entries are dropped rather than failing the whole read
    type Stored = Vec<serde_json::Value>;
    type Snapshot = SearchHistorySnapshot;

    fn from_stored(stored: Vec<serde_json::Value>) -> Self {
        stored
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn snapshot(view: View<Self>) -> SearchHistorySnapshot {
        SearchHistorySnapshot {
            hydrated: view.hydrated,
            version: view.version,
            items: view.value,
            actions: SearchHistoryActions { handle: view.handle },
        }
    }
}

/// Recent search queries, persisted under [`keys::SEARCH_HISTORY`].
#[derive(Clone)]
pub struct SearchHistoryStore {
    core: Arc<StoreCore<Vec<String>>>,
}

impl SearchHistoryStore {
    /// History entries carry no timestamps, so the store runs on the
    /// system clock.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            core: StoreCore::new(keys::SEARCH_HISTORY, backend, Arc::new(SystemClock::new())),
        }
    }

    pub async fn hydrate(&self) {
        self.core.hydrate().await
    }

    pub fn is_hydrated(&self) -> bool {
        self.core.is_hydrated()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.core.subscribe(Arc::new(listener))
    }

    pub fn snapshot(&self) -> Arc<SearchHistorySnapshot> {
        self.core.snapshot()
    }

    pub fn items(&self) -> Arc<Vec<String>> {
        self.core.current()
    }

    /// Moves `query` to the front, replacing any case-insensitive match.
    pub async fn add(&self, query: &str) -> Result<bool, StoreError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Ok(false);
        }
        let lower = query.to_lowercase();
        self.core
            .mutate(|items| {
                let next: Vec<String> = std::iter::once(query.clone())
                    .chain(items.iter().filter(|x| x.to_lowercase() != lower).cloned())
                    .take(MAX_HISTORY_ITEMS)
                    .collect();
                (next != *items).then_some(next)
            })
            .await
    }

    pub async fn remove(&self, query: &str) -> Result<bool, StoreError> {
        let query = normalize_query(query);
        if query.is_empty() {
            return Ok(false);
        }
        let lower = query.to_lowercase();
        self.core
            .mutate(|items| {
                let next: Vec<String> = items
                    .iter()
                    .filter(|x| x.to_lowercase() != lower)
                    .cloned()
                    .collect();
                (next.len() != items.len()).then_some(next)
            })
            .await
    }

    pub async fn clear(&self) -> Result<bool, StoreError> {
        self.core
            .mutate(|items| (!items.is_empty()).then(Vec::new))
            .await
    }
}

/// Actions bound to the store a snapshot came from.
#[derive(Clone)]
pub struct SearchHistoryActions {
    handle: Handle<Vec<String>>,
}

impl SearchHistoryActions {
    fn store(&self) -> Result<SearchHistoryStore, StoreError> {
        Ok(SearchHistoryStore {
            core: self.handle.upgrade()?,
        })
    }

    pub async fn add(&self, query: &str) -> Result<bool, StoreError> {
        self.store()?.add(query).await
    }

    pub async fn remove(&self, query: &str) -> Result<bool, StoreError> {
        self.store()?.remove(query).await
    }

    pub async fn clear(&self) -> Result<bool, StoreError> {
        self.store()?.clear().await
    }
}
