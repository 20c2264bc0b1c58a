//! User-created libraries: named, ordered collections of song references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod sort;

pub use sort::{sorted_items, SongTitles};

pub type LibraryId = String;

/// Presentation order of a library's items. Stored order is never changed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LibrarySortMode {
    TitleAsc,
    TitleDesc,
    #[default]
    AddedNewest,
    AddedOldest,
}

impl LibrarySortMode {
    pub const ALL: [LibrarySortMode; 4] = [
        LibrarySortMode::TitleAsc,
        LibrarySortMode::TitleDesc,
        LibrarySortMode::AddedNewest,
        LibrarySortMode::AddedOldest,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LibrarySortMode::TitleAsc => "Title A → Z",
            LibrarySortMode::TitleDesc => "Title Z → A",
            LibrarySortMode::AddedNewest => "Date added (newest)",
            LibrarySortMode::AddedOldest => "Date added (oldest)",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LibrarySortMode::TitleAsc => "TITLE_ASC",
            LibrarySortMode::TitleDesc => "TITLE_DESC",
            LibrarySortMode::AddedNewest => "ADDED_NEWEST",
            LibrarySortMode::AddedOldest => "ADDED_OLDEST",
        }
    }
}

impl fmt::Display for LibrarySortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibrarySortMode {
    type Err = String;

    /// Accepts `TITLE_ASC`, `title-asc`, `title_asc` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown sort mode '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(|m| m.as_str()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    /// Catalog song id. May dangle; consumers must cope.
    pub song_id: String,
    pub added_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub items: Vec<LibraryItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_mode: Option<LibrarySortMode>,
}

impl Library {
    /// Sort mode to display with; unset means newest first.
    pub fn effective_sort_mode(&self) -> LibrarySortMode {
        self.sort_mode.unwrap_or_default()
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.items.iter().any(|it| it.song_id == song_id)
    }
}
