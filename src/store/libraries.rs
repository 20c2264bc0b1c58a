use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::clock::Clock;
use super::listeners::Subscription;
use super::observable::{Collection, Handle, StoreCore, View};
use super::StoreError;
use crate::library::{Library, LibraryId, LibraryItem, LibrarySortMode};
use crate::storage::{keys, KeyValueStore};

pub const DEFAULT_LIBRARY_NAME: &str = "New Library";

/// Read-only view of the libraries at one version.
pub struct LibrariesSnapshot {
    pub hydrated: bool,
    pub version: u64,
    pub libraries: Arc<Vec<Library>>,
    by_id: HashMap<LibraryId, usize>,
    actions: LibraryActions,
}

impl LibrariesSnapshot {
    pub fn get(&self, id: &str) -> Option<&Library> {
        self.by_id.get(id).map(|&idx| &self.libraries[idx])
    }

    pub fn by_id(&self) -> impl Iterator<Item = (&str, &Library)> {
        self.by_id
            .iter()
            .map(|(id, &idx)| (id.as_str(), &self.libraries[idx]))
    }

    pub fn actions(&self) -> &LibraryActions {
        &self.actions
    }
}

impl Collection for Vec<Library> {
    type Stored = Vec<Library>;
    type Snapshot = LibrariesSnapshot;

    fn from_stored(stored: Vec<Library>) -> Self {
        stored
    }

    fn snapshot(view: View<Self>) -> LibrariesSnapshot {
        let mut by_id = HashMap::with_capacity(view.value.len());
        for (idx, lib) in view.value.iter().enumerate() {
            by_id.entry(lib.id.clone()).or_insert(idx);
        }
        LibrariesSnapshot {
            hydrated: view.hydrated,
            version: view.version,
            libraries: view.value,
            by_id,
            actions: LibraryActions { handle: view.handle },
        }
    }
}

/// Replaces the library `id` with `f`'s result. `None` when the id is
/// unknown or `f` declines.
fn update_one(
    libs: &[Library],
    id: &str,
    f: impl FnOnce(&Library) -> Option<Library>,
) -> Option<Vec<Library>> {
    let idx = libs.iter().position(|l| l.id == id)?;
    let updated = f(&libs[idx])?;
    let mut next = libs.to_vec();
    next[idx] = updated;
    Some(next)
}

/// The libraries collection, persisted under [`keys::LIBRARIES`].
///
/// Timestamps are read once hydration has finished, inside the mutation.
#[derive(Clone)]
pub struct LibraryStore {
    core: Arc<StoreCore<Vec<Library>>>,
}

impl LibraryStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            core: StoreCore::new(keys::LIBRARIES, backend, clock),
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

    pub fn snapshot(&self) -> Arc<LibrariesSnapshot> {
        self.core.snapshot()
    }

    pub fn libraries(&self) -> Arc<Vec<Library>> {
        self.core.current()
    }

    /// Prepends a new empty library and returns its id. A blank name
    /// becomes [`DEFAULT_LIBRARY_NAME`].
    pub async fn create_library(&self, name: &str) -> Result<LibraryId, StoreError> {
        let id = Uuid::new_v4().to_string();
        let trimmed = name.trim();
        let name = if trimmed.is_empty() {
            DEFAULT_LIBRARY_NAME
        } else {
            trimmed
        };

        self.core
            .mutate(|libs| {
                let now = self.core.now_ms();
                let mut next = Vec::with_capacity(libs.len() + 1);
                next.push(Library {
                    id: id.clone(),
                    name: name.to_string(),
                    created_at: now,
                    updated_at: now,
                    items: Vec::new(),
                    sort_mode: Some(LibrarySortMode::AddedNewest),
                });
                next.extend(libs.iter().cloned());
                Some(next)
            })
            .await?;
        debug!(id = %id, name, "created library");
        Ok(id)
    }

    /// Renames `id`. Blank names and unknown ids are ignored.
    pub async fn rename_library(&self, id: &str, name: &str) -> Result<bool, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        self.core
            .mutate(|libs| {
                let now = self.core.now_ms();
                update_one(libs, id, |lib| {
                    if lib.name == name {
                        return None;
                    }
                    Some(Library {
                        name: name.to_string(),
                        updated_at: now,
                        ..lib.clone()
                    })
                })
            })
            .await
    }

    pub async fn delete_library(&self, id: &str) -> Result<bool, StoreError> {
        self.core
            .mutate(|libs| {
                if !libs.iter().any(|l| l.id == id) {
                    return None;
                }
                Some(libs.iter().filter(|l| l.id != id).cloned().collect())
            })
            .await
    }

    /// Appends `song_id` unless the library already holds it.
    pub async fn add_song_to_library(&self, library_id: &str, song_id: &str) -> Result<bool, StoreError> {
        self.core
            .mutate(|libs| {
                let now = self.core.now_ms();
                update_one(libs, library_id, |lib| {
                    if lib.contains(song_id) {
                        return None;
                    }
                    let mut next = lib.clone();
                    next.items.push(LibraryItem {
                        song_id: song_id.to_string(),
                        added_at: now,
                    });
                    next.updated_at = now;
                    Some(next)
                })
            })
            .await
    }

    pub async fn remove_song_from_library(&self, library_id: &str, song_id: &str) -> Result<bool, StoreError> {
        self.core
            .mutate(|libs| {
                let now = self.core.now_ms();
                update_one(libs, library_id, |lib| {
                    if !lib.contains(song_id) {
                        return None;
                    }
                    let mut next = lib.clone();
                    next.items.retain(|it| it.song_id != song_id);
                    next.updated_at = now;
                    Some(next)
                })
            })
            .await
    }

    /// Moves the item at `from` to position `to`. Out-of-range indices
    /// leave everything untouched.
    pub async fn move_song(&self, library_id: &str, from: usize, to: usize) -> Result<bool, StoreError> {
        self.core
            .mutate(|libs| {
                let now = self.core.now_ms();
                update_one(libs, library_id, |lib| {
                    let len = lib.items.len();
                    if from >= len || to >= len || from == to {
                        return None;
                    }
                    let mut next = lib.clone();
                    let moved = next.items.remove(from);
                    next.items.insert(to, moved);
                    next.updated_at = now;
                    Some(next)
                })
            })
            .await
    }

    /// Records the display order for a library; stored item order is kept.
    pub async fn set_library_sort_mode(
        &self,
        library_id: &str,
        mode: LibrarySortMode,
    ) -> Result<bool, StoreError> {
        self.core
            .mutate(|libs| {
                let now = self.core.now_ms();
                update_one(libs, library_id, |lib| {
                    if lib.sort_mode == Some(mode) {
                        return None;
                    }
                    Some(Library {
                        sort_mode: Some(mode),
                        updated_at: now,
                        ..lib.clone()
                    })
                })
            })
            .await
    }
}

/// Actions bound to the store a snapshot came from.
///
/// Holds only a weak reference; once every [`LibraryStore`] handle is
/// dropped each call fails with [`StoreError::Closed`].
#[derive(Clone)]
pub struct LibraryActions {
    handle: Handle<Vec<Library>>,
}

impl LibraryActions {
    fn store(&self) -> Result<LibraryStore, StoreError> {
        Ok(LibraryStore {
            core: self.handle.upgrade()?,
        })
    }

    pub async fn create_library(&self, name: &str) -> Result<LibraryId, StoreError> {
        self.store()?.create_library(name).await
    }

    pub async fn rename_library(&self, id: &str, name: &str) -> Result<bool, StoreError> {
        self.store()?.rename_library(id, name).await
    }

    pub async fn delete_library(&self, id: &str) -> Result<bool, StoreError> {
        self.store()?.delete_library(id).await
    }

    pub async fn add_song_to_library(&self, library_id: &str, song_id: &str) -> Result<bool, StoreError> {
        self.store()?.add_song_to_library(library_id, song_id).await
    }

    pub async fn remove_song_from_library(&self, library_id: &str, song_id: &str) -> Result<bool, StoreError> {
        self.store()?.remove_song_from_library(library_id, song_id).await
    }

    pub async fn move_song(&self, library_id: &str, from: usize, to: usize) -> Result<bool, StoreError> {
        self.store()?.move_song(library_id, from, to).await
    }

    pub async fn set_library_sort_mode(&self, library_id: &str, mode: LibrarySortMode) -> Result<bool, StoreError> {
        self.store()?.set_library_sort_mode(library_id, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use crate::store::clock::ManualClock;

    fn store_with(backend: Arc<MemoryStore>, clock: Arc<ManualClock>) -> LibraryStore {
        LibraryStore::new(backend, clock)
    }

    fn fresh() -> (LibraryStore, Arc<MemoryStore>, Arc<ManualClock>) {
        let backend = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        (store_with(backend.clone(), clock.clone()), backend, clock)
    }

    fn song_ids(lib: &Library) -> Vec<&str> {
        lib.items.iter().map(|it| it.song_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_prepends_with_defaults() {
        let (store, _, clock) = fresh();
        let first = store.create_library("  Gym  ").await.unwrap();
        clock.advance(10);
        let second = store.create_library("   ").await.unwrap();

        let snap = store.snapshot();
        assert!(snap.hydrated);
        assert_eq!(snap.libraries.len(), 2);
        assert_eq!(snap.libraries[0].id, second);
        assert_eq!(snap.libraries[0].name, DEFAULT_LIBRARY_NAME);
        assert_eq!(snap.libraries[0].created_at, 1_010);

        let gym = snap.get(&first).unwrap();
        assert_eq!(gym.name, "Gym");
        assert_eq!(gym.sort_mode, Some(LibrarySortMode::AddedNewest));
        assert!(gym.items.is_empty());
        assert_eq!(gym.created_at, gym.updated_at);
        assert_ne!(first, second);
    }

    /// Backend whose reads take `delay_ms` of clock time.
    struct SlowRead {
        inner: MemoryStore,
        clock: Arc<ManualClock>,
        delay_ms: i64,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for SlowRead {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.clock.advance(self.delay_ms);
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key).await
        }
    }

    #[tokio::test]
    async fn test_timestamps_taken_after_hydration() {
        let clock = Arc::new(ManualClock::new(1_000));
        let backend = Arc::new(SlowRead {
            inner: MemoryStore::new(),
            clock: clock.clone(),
            delay_ms: 500,
        });
        let store = LibraryStore::new(backend, clock.clone());
        assert!(!store.is_hydrated());

        let id = store.create_library("Late").await.unwrap();
        let snap = store.snapshot();
        let lib = snap.get(&id).unwrap();
        assert_eq!(lib.created_at, 1_500);
        assert_eq!(lib.updated_at, 1_500);

        clock.advance(10);
        assert!(store.add_song_to_library(&id, "s1").await.unwrap());
        assert_eq!(store.snapshot().get(&id).unwrap().items[0].added_at, 1_510);
    }

    #[tokio::test]
    async fn test_rename() {
        let (store, _, clock) = fresh();
        let id = store.create_library("Old").await.unwrap();
        clock.advance(5);

        assert!(store.rename_library(&id, " New ").await.unwrap());
        assert!(!store.rename_library(&id, "   ").await.unwrap());
        assert!(!store.rename_library("missing", "X").await.unwrap());

        let snap = store.snapshot();
        let lib = snap.get(&id).unwrap();
        assert_eq!(lib.name, "New");
        assert_eq!(lib.updated_at, 1_005);
        assert_eq!(lib.created_at, 1_000);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _, _) = fresh();
        let a = store.create_library("A").await.unwrap();
        let b = store.create_library("B").await.unwrap();

        assert!(store.delete_library(&a).await.unwrap());
        assert!(!store.delete_library(&a).await.unwrap());

        let snap = store.snapshot();
        assert_eq!(snap.libraries.len(), 1);
        assert!(snap.get(&a).is_none());
        assert!(snap.get(&b).is_some());
    }

    #[tokio::test]
    async fn test_add_song_is_idempotent() {
        let (store, backend, clock) = fresh();
        let id = store.create_library("Mix").await.unwrap();

        clock.advance(1);
        assert!(store.add_song_to_library(&id, "s1").await.unwrap());
        let once = store.snapshot().get(&id).unwrap().items.clone();
        let writes = backend.writes();

        clock.advance(1);
        assert!(!store.add_song_to_library(&id, "s1").await.unwrap());
        let twice = store.snapshot().get(&id).unwrap().items.clone();

        assert_eq!(once, twice);
        assert_eq!(once[0].added_at, 1_001);
        assert_eq!(backend.writes(), writes);
        assert!(!store.add_song_to_library("missing", "s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_song() {
        let (store, _, _) = fresh();
        let id = store.create_library("Mix").await.unwrap();
        store.add_song_to_library(&id, "s1").await.unwrap();
        store.add_song_to_library(&id, "s2").await.unwrap();

        assert!(store.remove_song_from_library(&id, "s1").await.unwrap());
        assert!(!store.remove_song_from_library(&id, "s1").await.unwrap());
        assert_eq!(song_ids(store.snapshot().get(&id).unwrap()), vec!["s2"]);
    }

    #[tokio::test]
    async fn test_move_song() {
        let (store, _, _) = fresh();
        let id = store.create_library("Mix").await.unwrap();
        for s in ["a", "b", "c", "d"] {
            store.add_song_to_library(&id, s).await.unwrap();
        }

        assert!(store.move_song(&id, 0, 2).await.unwrap());
        assert_eq!(song_ids(store.snapshot().get(&id).unwrap()), vec!["b", "c", "a", "d"]);

        assert!(store.move_song(&id, 3, 0).await.unwrap());
        assert_eq!(song_ids(store.snapshot().get(&id).unwrap()), vec!["d", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_move_song_out_of_range_is_noop() {
        let (store, _, _) = fresh();
        let id = store.create_library("Mix").await.unwrap();
        store.add_song_to_library(&id, "a").await.unwrap();
        store.add_song_to_library(&id, "b").await.unwrap();

        let before = store.snapshot();
        assert!(!store.move_song(&id, 2, 0).await.unwrap());
        assert!(!store.move_song(&id, 0, 2).await.unwrap());
        assert!(!store.move_song(&id, usize::MAX, 0).await.unwrap());
        assert!(!store.move_song("missing", 0, 1).await.unwrap());

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&before.libraries, &after.libraries));
    }

    #[tokio::test]
    async fn test_sort_mode_does_not_reorder() {
        let (store, _, _) = fresh();
        let id = store.create_library("Mix").await.unwrap();
        store.add_song_to_library(&id, "a").await.unwrap();
        store.add_song_to_library(&id, "b").await.unwrap();

        assert!(store.set_library_sort_mode(&id, LibrarySortMode::TitleDesc).await.unwrap());
        assert!(!store.set_library_sort_mode(&id, LibrarySortMode::TitleDesc).await.unwrap());

        let snap = store.snapshot();
        let lib = snap.get(&id).unwrap();
        assert_eq!(lib.sort_mode, Some(LibrarySortMode::TitleDesc));
        assert_eq!(song_ids(lib), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_snapshot_actions_are_bound() {
        let (store, _, _) = fresh();
        let id = store.snapshot().actions().create_library("Bound").await.unwrap();
        assert_eq!(store.snapshot().get(&id).unwrap().name, "Bound");

        let actions = store.snapshot().actions().clone();
        drop(store);
        assert!(matches!(actions.delete_library(&id).await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_rehydrate_from_same_backend() {
        let (store, backend, _) = fresh();
        let id = store.create_library("Keep").await.unwrap();
        store.add_song_to_library(&id, "s1").await.unwrap();
        store.set_library_sort_mode(&id, LibrarySortMode::TitleAsc).await.unwrap();

        let reopened = store_with(backend, Arc::new(ManualClock::new(0)));
        reopened.hydrate().await;
        assert_eq!(*reopened.libraries(), *store.libraries());
    }

    #[tokio::test]
    async fn test_malformed_storage_hydrates_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.set_item(keys::LIBRARIES, "not json".to_string()).await.unwrap();
        let store = store_with(backend, Arc::new(ManualClock::new(0)));
        store.hydrate().await;
        assert!(store.is_hydrated());
        assert!(store.libraries().is_empty());
    }
}
