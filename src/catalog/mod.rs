//! Read-only song catalog, loaded once from a JSON document.

use std::collections::HashMap;
use std::path::Path;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::library::{Library, SongTitles};

const BUNDLED_CATALOG: &str = include_str!("../../data/songs.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub lyrics: String,
    pub language: String,
    pub tags: Vec<String>,
}

/// Stringifies scalars; `null` counts as absent.
fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Song {
    /// Builds a song from a loosely shaped catalog entry. Missing ids fall
    /// back to `slug`, then `title`, then the entry's position.
    fn from_entry(index: usize, entry: &Value) -> Song {
        let field = |name: &str| text(entry.get(name));

        let id = field("id")
            .or_else(|| field("slug"))
            .or_else(|| field("title"))
            .unwrap_or_else(|| format!("song-{}", index));
        let title = field("title").unwrap_or_else(|| "Untitled".to_string());
        let lyrics = field("lyrics").or_else(|| field("text")).unwrap_or_default();
        let language = field("language")
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "English".to_string());
        let tags = match entry.get("tags") {
            Some(Value::Array(tags)) => tags.iter().filter_map(|t| text(Some(t))).collect(),
            _ => Vec::new(),
        };

        Song {
            id,
            title,
            lyrics,
            language,
            tags,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SongCatalog {
    songs: Vec<Song>,
    by_id: HashMap<String, usize>,
}

impl SongCatalog {
    pub fn new(songs: Vec<Song>) -> Self {
        let mut by_id = HashMap::with_capacity(songs.len());
        for (idx, song) in songs.iter().enumerate() {
            // First entry wins on duplicate ids
            by_id.entry(song.id.clone()).or_insert(idx);
        }
        Self { songs, by_id }
    }

    /// Parses a catalog document: either a bare array of songs or an
    /// object with a `songs` array.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let doc: Value = serde_json::from_str(raw)?;
        let entries: &[Value] = match &doc {
            Value::Array(entries) => entries.as_slice(),
            Value::Object(map) => match map.get("songs") {
                Some(Value::Array(entries)) => entries.as_slice(),
                _ => &[],
            },
            _ => &[],
        };
        let songs: Vec<Song> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| Song::from_entry(i, e))
            .collect();
        debug!(count = songs.len(), "loaded song catalog");
        Ok(Self::new(songs))
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn all_songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn song_by_id(&self, id: &str) -> Option<&Song> {
        self.by_id.get(id).map(|&idx| &self.songs[idx])
    }

    /// Case-insensitive substring match over title and lyrics. A blank
    /// query returns the whole catalog.
    pub fn search_songs(&self, query: &str) -> Vec<&Song> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return self.songs.iter().collect();
        }
        self.songs
            .iter()
            .filter(|s| format!("{}\n{}", s.title, s.lyrics).to_lowercase().contains(&q))
            .collect()
    }

    /// Fuzzy title match, best first. Songs whose lyrics contain the query
    /// but whose title does not fuzzy-match follow in catalog order.
    pub fn fuzzy_search(&self, query: &str) -> Vec<&Song> {
        let q = query.trim();
        if q.is_empty() {
            return self.songs.iter().collect();
        }
        let matcher = SkimMatcherV2::default().ignore_case();
        let mut scored: Vec<(i64, &Song)> = self
            .songs
            .iter()
            .filter_map(|s| matcher.fuzzy_match(&s.title, q).map(|score| (score, s)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let lower = q.to_lowercase();
        let mut results: Vec<&Song> = scored.into_iter().map(|(_, s)| s).collect();
        for song in &self.songs {
            if song.lyrics.to_lowercase().contains(&lower) && !results.iter().any(|r| r.id == song.id) {
                results.push(song);
            }
        }
        results
    }

    /// Songs matching `query` that could be added to `library`, each with
    /// whether it is already in it.
    pub fn candidates_for<'a>(&'a self, library: &Library, query: &str) -> Vec<(&'a Song, bool)> {
        self.search_songs(query)
            .into_iter()
            .map(|s| (s, library.contains(&s.id)))
            .collect()
    }
}

impl SongTitles for SongCatalog {
    fn title_of(&self, song_id: &str) -> Option<&str> {
        self.song_by_id(song_id).map(|s| s.title.as_str())
    }
}
