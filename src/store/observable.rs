use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use super::clock::Clock;
use super::listeners::{Listener, ListenerRegistry, Subscription};
use super::StoreError;
use crate::storage::{read_json, write_json, KeyValueStore};

/// A value held by a [`StoreCore`]: persisted whole under one key and
/// projected into a snapshot type for observers.
pub trait Collection: Serialize + Default + Send + Sync + Sized + 'static {
    /// Shape decoded from storage before sanitizing.
    type Stored: DeserializeOwned + Default + Send;
    type Snapshot: Send + Sync + 'static;

    fn from_stored(stored: Self::Stored) -> Self;
    fn snapshot(view: View<Self>) -> Self::Snapshot;
}

/// Everything a snapshot is built from.
pub struct View<C: Collection> {
    pub hydrated: bool,
    pub version: u64,
    pub value: Arc<C>,
    pub handle: Handle<C>,
}

/// Non-owning reference back to a store, carried by snapshots so that
/// cached snapshots never keep their store alive.
pub struct Handle<C: Collection>(Weak<StoreCore<C>>);

impl<C: Collection> Handle<C> {
    pub fn upgrade(&self) -> Result<Arc<StoreCore<C>>, StoreError> {
        self.0.upgrade().ok_or(StoreError::Closed)
    }
}

impl<C: Collection> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

struct State<C> {
    value: Arc<C>,
    version: u64,
    hydrated: bool,
}

/// Observable in-memory copy of one persisted collection.
///
/// * hydration runs at most once; concurrent first users share one backend read
/// * every change swaps in a whole new value, bumps `version` and notifies
///   listeners synchronously before the write to storage starts
/// * snapshots are cached per `version`
/// * writes to storage are serialized and always carry the newest value, so
///   the last write to land is never older than the in-memory state
pub struct StoreCore<C: Collection> {
    key: &'static str,
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    hydration: OnceCell<()>,
    hydration_kicked: AtomicBool,
    state: RwLock<State<C>>,
    cached: Mutex<Option<(u64, Arc<C::Snapshot>)>>,
    listeners: Arc<ListenerRegistry>,
    persisted_version: tokio::sync::Mutex<u64>,
}

impl<C: Collection> StoreCore<C> {
    pub fn new(key: &'static str, backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            key,
            backend,
            clock,
            hydration: OnceCell::new(),
            hydration_kicked: AtomicBool::new(false),
            state: RwLock::new(State {
                value: Arc::new(C::default()),
                version: 0,
                hydrated: false,
            }),
            cached: Mutex::new(None),
            listeners: Arc::new(ListenerRegistry::new()),
            persisted_version: tokio::sync::Mutex::new(0),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State<C>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State<C>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn is_hydrated(&self) -> bool {
        self.read_state().hydrated
    }

    pub fn version(&self) -> u64 {
        self.read_state().version
    }

    pub fn current(&self) -> Arc<C> {
        self.read_state().value.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Loads the persisted value on first call; later calls return at once.
    pub async fn hydrate(&self) {
        self.hydration
            .get_or_init(|| async {
                let stored = read_json(self.backend.as_ref(), self.key, C::Stored::default()).await;
                let value = C::from_stored(stored);
                let version = {
                    let mut state = self.write_state();
                    state.value = Arc::new(value);
                    state.hydrated = true;
                    state.version += 1;
                    state.version
                };
                debug!(key = self.key, version, "hydrated");
                // Observers waiting on `hydrated` need this even when empty
                self.listeners.emit();
            })
            .await;
    }

    /// Registers `listener` and starts hydration in the background if a
    /// tokio runtime is available.
    pub fn subscribe(self: &Arc<Self>, listener: Listener) -> Subscription {
        let subscription = self.listeners.add(listener);
        if !self.hydration_kicked.swap(true, Ordering::SeqCst) {
            match tokio::runtime::Handle::try_current() {
                Ok(rt) => {
                    let this = Arc::clone(self);
                    rt.spawn(async move { this.hydrate().await });
                }
                Err(_) => {
                    // Retry on the next subscribe; the first action hydrates anyway
                    self.hydration_kicked.store(false, Ordering::SeqCst);
                }
            }
        }
        subscription
    }

    /// Returns the snapshot for the current version, building it only if
    /// the version moved since the last call.
    pub fn snapshot(self: &Arc<Self>) -> Arc<C::Snapshot> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        let state = self.read_state();
        if let Some((version, snapshot)) = cached.as_ref() {
            if *version == state.version {
                return Arc::clone(snapshot);
            }
        }

        let snapshot = Arc::new(C::snapshot(View {
            hydrated: state.hydrated,
            version: state.version,
            value: Arc::clone(&state.value),
            handle: Handle(Arc::downgrade(self)),
        }));
        *cached = Some((state.version, Arc::clone(&snapshot)));
        snapshot
    }

    /// Applies `transform` to the hydrated value.
    ///
    /// `transform` returns `None` for a no-op, in which case nothing is
    /// notified or written and `Ok(false)` comes back. Otherwise listeners
    /// run before the write, and a write failure is returned after the
    /// in-memory value has already moved on.
    pub async fn mutate<F>(&self, transform: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&C) -> Option<C>,
    {
        self.hydrate().await;

        let version = {
            let mut state = self.write_state();
            match transform(&state.value) {
                Some(next) => {
                    state.value = Arc::new(next);
                    state.version += 1;
                    Some(state.version)
                }
                None => None,
            }
        };

        let Some(version) = version else {
            debug!(key = self.key, "mutation left the collection unchanged");
            return Ok(false);
        };

        debug!(key = self.key, version, "collection changed");
        self.listeners.emit();
        self.persist().await?;
        Ok(true)
    }

    /// Writes the newest value unless an equal or newer version already
    /// reached storage.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let mut persisted = self.persisted_version.lock().await;
        let (value, version) = {
            let state = self.read_state();
            (Arc::clone(&state.value), state.version)
        };
        if version <= *persisted {
            debug!(key = self.key, version, "already persisted");
            return Ok(());
        }

        write_json(self.backend.as_ref(), self.key, value.as_ref()).await?;
        *persisted = version;
        debug!(key = self.key, version, "persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::store::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default, Serialize, PartialEq)]
    struct Numbers(Vec<u32>);

    struct NumbersSnapshot {
        hydrated: bool,
        version: u64,
        value: Arc<Numbers>,
    }

    impl Collection for Numbers {
        type Stored = Vec<u32>;
        type Snapshot = NumbersSnapshot;

        fn from_stored(stored: Vec<u32>) -> Self {
            Numbers(stored)
        }

        fn snapshot(view: View<Self>) -> NumbersSnapshot {
            NumbersSnapshot {
                hydrated: view.hydrated,
                version: view.version,
                value: view.value,
            }
        }
    }

    fn numbers_store(backend: Arc<MemoryStore>) -> Arc<StoreCore<Numbers>> {
        StoreCore::new("numbers", backend, Arc::new(ManualClock::new(0)))
    }

    fn push(n: u32) -> impl FnOnce(&Numbers) -> Option<Numbers> {
        move |cur| {
            let mut next = cur.0.clone();
            next.push(n);
            Some(Numbers(next))
        }
    }

    #[tokio::test]
    async fn test_hydrate_reads_once_and_notifies() {
        let backend = Arc::new(MemoryStore::new());
        backend.set_item("numbers", "[1,2]".to_string()).await.unwrap();
        let store = numbers_store(backend.clone());

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = store.listeners.add(Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!store.is_hydrated());
        tokio::join!(store.hydrate(), store.hydrate(), store.hydrate());
        store.hydrate().await;

        assert_eq!(backend.reads(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(store.is_hydrated());
        assert_eq!(*store.current(), Numbers(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_hydration_of_empty_backend_still_notifies() {
        let store = numbers_store(Arc::new(MemoryStore::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _sub = store.listeners.add(Arc::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        store.hydrate().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(store.snapshot().hydrated);
        assert!(store.snapshot().value.0.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_cached_per_version() {
        let store = numbers_store(Arc::new(MemoryStore::new()));
        store.hydrate().await;

        let a = store.snapshot();
        let b = store.snapshot();
        assert!(Arc::ptr_eq(&a, &b));

        assert!(store.mutate(push(3)).await.unwrap());
        let c = store.snapshot();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.version, a.version + 1);
        assert_eq!(c.value.0, vec![3]);
    }

    #[tokio::test]
    async fn test_noop_mutation_changes_nothing() {
        let backend = Arc::new(MemoryStore::new());
        let store = numbers_store(backend.clone());
        store.hydrate().await;
        let before = store.snapshot();

        assert!(!store.mutate(|_| None).await.unwrap());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_in_memory_change() {
        let backend = Arc::new(MemoryStore::new());
        let store = numbers_store(backend.clone());
        backend.fail_writes(true);

        let res = store.mutate(push(1)).await;
        assert!(matches!(res, Err(StoreError::Storage(_))));
        assert_eq!(store.current().0, vec![1]);
        assert_eq!(backend.raw("numbers"), None);

        // The next successful write carries everything
        backend.fail_writes(false);
        store.mutate(push(2)).await.unwrap();
        assert_eq!(backend.raw("numbers").as_deref(), Some("[1,2]"));
    }

    #[tokio::test]
    async fn test_racing_mutations_persist_final_state() {
        let backend = Arc::new(MemoryStore::new());
        let store = numbers_store(backend.clone());

        let (a, b, c) = tokio::join!(
            store.mutate(push(1)),
            store.mutate(push(2)),
            store.mutate(push(3))
        );
        assert!(a.unwrap() && b.unwrap() && c.unwrap());

        let stored: Vec<u32> = serde_json::from_str(&backend.raw("numbers").unwrap()).unwrap();
        assert_eq!(stored, store.current().0);
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn test_subscribe_kicks_off_hydration() {
        let backend = Arc::new(MemoryStore::new());
        backend.set_item("numbers", "[9]".to_string()).await.unwrap();
        let store = numbers_store(backend.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = store.subscribe(Arc::new(move || {
            let _ = tx.send(());
        }));

        rx.recv().await.unwrap();
        assert!(store.is_hydrated());
        assert_eq!(store.current().0, vec![9]);
        assert_eq!(backend.reads(), 1);
    }

    #[test]
    fn test_snapshot_handle_does_not_keep_store_alive() {
        let store = numbers_store(Arc::new(MemoryStore::new()));
        let view_handle = Handle(Arc::downgrade(&store));
        drop(store);
        assert!(matches!(view_handle.upgrade(), Err(StoreError::Closed)));
    }
}
