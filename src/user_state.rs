//! Favourites and recently viewed songs.
//!
//! Both are plain lists of song ids under their own key, read and rewritten
//! whole on every call. Unlike the libraries they have no in-memory cache.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{Song, SongCatalog};
use crate::storage::{keys, read_json, write_json, KeyValueStore, StorageError};

pub const MAX_RECENTS: usize = 50;

#[derive(Clone)]
pub struct UserState {
    backend: Arc<dyn KeyValueStore>,
}

impl UserState {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub async fn favourites(&self) -> Vec<String> {
        read_json(self.backend.as_ref(), keys::FAVOURITES, Vec::new()).await
    }

    pub async fn is_favourite(&self, song_id: &str) -> bool {
        self.favourites().await.iter().any(|id| id == song_id)
    }

    /// Removes `song_id` if present, otherwise puts it first. Returns the
    /// new list.
    pub async fn toggle_favourite(&self, song_id: &str) -> Result<Vec<String>, StorageError> {
        let favs = self.favourites().await;
        let next: Vec<String> = if favs.iter().any(|id| id == song_id) {
            favs.into_iter().filter(|id| id != song_id).collect()
        } else {
            std::iter::once(song_id.to_string()).chain(favs).collect()
        };
        write_json(self.backend.as_ref(), keys::FAVOURITES, &next).await?;
        debug!(song_id, count = next.len(), "toggled favourite");
        Ok(next)
    }

    pub async fn clear_favourites(&self) -> Result<(), StorageError> {
        write_json(self.backend.as_ref(), keys::FAVOURITES, &Vec::<String>::new()).await
    }

    pub async fn recents(&self) -> Vec<String> {
        read_json(self.backend.as_ref(), keys::RECENTS, Vec::new()).await
    }

    /// Moves `song_id` to the front of the recents, keeping at most
    /// [`MAX_RECENTS`].
    pub async fn push_recent(&self, song_id: &str) -> Result<Vec<String>, StorageError> {
        let recents = self.recents().await;
        let next: Vec<String> = std::iter::once(song_id.to_string())
            .chain(recents.into_iter().filter(|id| id != song_id))
            .take(MAX_RECENTS)
            .collect();
        write_json(self.backend.as_ref(), keys::RECENTS, &next).await?;
        Ok(next)
    }

    pub async fn clear_recents(&self) -> Result<(), StorageError> {
        write_json(self.backend.as_ref(), keys::RECENTS, &Vec::<String>::new()).await
    }
}

/// Looks `ids` up in `catalog`, dropping ids the catalog does not know.
pub fn resolve_songs<'a>(catalog: &'a SongCatalog, ids: &[String]) -> Vec<&'a Song> {
    ids.iter().filter_map(|id| catalog.song_by_id(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn state() -> UserState {
        UserState::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_toggle_favourite() {
        let state = state();
        assert_eq!(state.toggle_favourite("a").await.unwrap(), vec!["a"]);
        assert_eq!(state.toggle_favourite("b").await.unwrap(), vec!["b", "a"]);
        assert!(state.is_favourite("a").await);

        assert_eq!(state.toggle_favourite("a").await.unwrap(), vec!["b"]);
        assert!(!state.is_favourite("a").await);

        state.clear_favourites().await.unwrap();
        assert!(state.favourites().await.is_empty());
    }

    #[tokio::test]
    async fn test_recents_are_capped_and_deduped() {
        let state = state();
        for i in 0..60 {
            state.push_recent(&format!("s{}", i)).await.unwrap();
        }
        let recents = state.push_recent("s10").await.unwrap();
        assert_eq!(recents.len(), MAX_RECENTS);
        assert_eq!(recents[0], "s10");
        assert_eq!(recents[1], "s59");
        assert_eq!(recents.iter().filter(|id| *id == "s10").count(), 1);

        state.clear_recents().await.unwrap();
        assert!(state.recents().await.is_empty());
    }

    #[test]
    fn test_resolve_drops_dangling_ids() {
        let catalog = SongCatalog::bundled().unwrap();
        let ids = vec!["danny-boy".to_string(), "ghost".to_string(), "oh-susanna".to_string()];
        let songs: Vec<&str> = resolve_songs(&catalog, &ids).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(songs, vec!["danny-boy", "oh-susanna"]);
    }
}
