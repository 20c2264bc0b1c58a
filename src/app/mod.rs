//! Application wiring: catalog, stores and user state built from config.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::catalog::{Song, SongCatalog};
use crate::library::{sorted_items, Library, LibraryItem, LibrarySortMode};
use crate::storage::{keys, FileStore, KeyValueStore, StorageError};
use crate::store::{Clock, LibraryStore, SearchHistoryStore, StoreError, SystemClock};
use crate::user_state::UserState;

pub mod cli;
pub mod config;
pub mod logging;

pub use config::{AppConfig, UserConfig};

/// One library item joined with its catalog song, if the catalog has it.
#[derive(Debug, Clone)]
pub struct LibraryRow<'a> {
    pub item: LibraryItem,
    pub song: Option<&'a Song>,
}

impl LibraryRow<'_> {
    pub fn display_title(&self) -> String {
        match self.song {
            Some(song) => song.title.clone(),
            None => format!("Unknown song ({})", self.item.song_id),
        }
    }
}

/// A library ready for display: items in the library's sort order.
#[derive(Debug, Clone)]
pub struct LibraryView<'a> {
    pub library: Library,
    pub sort_mode: LibrarySortMode,
    pub rows: Vec<LibraryRow<'a>>,
}

pub struct App {
    pub catalog: SongCatalog,
    pub libraries: LibraryStore,
    pub history: SearchHistoryStore,
    pub user: UserState,
    /// Used for libraries whose sort mode was never set
    pub default_sort_mode: LibrarySortMode,
    backend: Arc<dyn KeyValueStore>,
}

impl App {
    pub fn new(
        catalog: SongCatalog,
        backend: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        default_sort_mode: LibrarySortMode,
    ) -> Self {
        Self {
            catalog,
            libraries: LibraryStore::new(backend.clone(), clock),
            history: SearchHistoryStore::new(backend.clone()),
            user: UserState::new(backend.clone()),
            default_sort_mode,
            backend,
        }
    }

    /// Opens the file-backed app described by `config`.
    pub fn open(config: &UserConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => SongCatalog::load(&PathBuf::from(path))
                .with_context(|| format!("loading catalog {}", path))?,
            None => SongCatalog::bundled().context("loading bundled catalog")?,
        };

        let data_dir = AppConfig::data_dir(config);
        let backend = FileStore::open(&data_dir)
            .with_context(|| format!("opening data dir {}", data_dir.display()))?;
        info!(data_dir = %data_dir.display(), songs = catalog.len(), "opened songbook");

        Ok(Self::new(
            catalog,
            Arc::new(backend),
            Arc::new(SystemClock::new()),
            config.default_sort_mode,
        ))
    }

    /// Moves a library item by signed positions as typed on the command
    /// line. A negative position is out of range, so nothing changes.
    pub async fn move_song_at(&self, library_id: &str, from: i64, to: i64) -> Result<bool, StoreError> {
        match (usize::try_from(from), usize::try_from(to)) {
            (Ok(from), Ok(to)) => self.libraries.move_song(library_id, from, to).await,
            _ => {
                debug!(library_id, from, to, "negative move position ignored");
                Ok(false)
            }
        }
    }

    /// Looks a song up and records it as recently viewed.
    pub async fn view_song(&self, song_id: &str) -> Result<Option<&Song>, StorageError> {
        let Some(song) = self.catalog.song_by_id(song_id) else {
            return Ok(None);
        };
        self.user.push_recent(song_id).await?;
        Ok(Some(song))
    }

    /// Searches the catalog and records non-blank queries in the history.
    pub async fn search(&self, query: &str, fuzzy: bool) -> Result<Vec<&Song>, StoreError> {
        self.history.add(query).await?;
        Ok(if fuzzy {
            self.catalog.fuzzy_search(query)
        } else {
            self.catalog.search_songs(query)
        })
    }

    pub async fn favourite_songs(&self) -> Vec<&Song> {
        let ids = self.user.favourites().await;
        crate::user_state::resolve_songs(&self.catalog, &ids)
    }

    pub async fn recent_songs(&self) -> Vec<&Song> {
        let ids = self.user.recents().await;
        crate::user_state::resolve_songs(&self.catalog, &ids)
    }

    pub async fn library_view(&self, library_id: &str) -> Option<LibraryView<'_>> {
        self.libraries.hydrate().await;
        let snapshot = self.libraries.snapshot();
        let library = snapshot.get(library_id)?.clone();

        let sort_mode = library.sort_mode.unwrap_or(self.default_sort_mode);
        let rows = sorted_items(&library, sort_mode, &self.catalog)
            .into_iter()
            .map(|item| LibraryRow {
                item: item.clone(),
                song: self.catalog.song_by_id(&item.song_id),
            })
            .collect();

        Some(LibraryView {
            library,
            sort_mode,
            rows,
        })
    }

    /// Removes every persisted collection. Stores already hydrated in this
    /// process keep their in-memory values.
    pub async fn reset(&self) -> Result<(), StorageError> {
        for key in keys::ALL {
            self.backend.remove_item(key).await?;
        }
        info!("removed all persisted data");
        Ok(())
    }
}
