use std::cmp::Ordering;
use std::collections::HashMap;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::{Library, LibraryItem, LibrarySortMode};

/// Title lookup used by the title sort modes.
pub trait SongTitles {
    fn title_of(&self, song_id: &str) -> Option<&str>;
}

impl SongTitles for HashMap<String, String> {
    fn title_of(&self, song_id: &str) -> Option<&str> {
        self.get(song_id).map(String::as_str)
    }
}

/// Collation key for a title: the lower-cased title with accents stripped
/// decides first, the accented form only breaks ties between otherwise
/// equal titles ("Elan" < "Élan" < "Elba").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TitleKey {
    base: String,
    accented: String,
}

impl TitleKey {
    fn new(title: &str) -> Self {
        let accented = title.to_lowercase();
        let base = accented.nfd().filter(|c| !is_combining_mark(*c)).collect();
        Self { base, accented }
    }
}

fn compare_titles(a: &TitleKey, b: &TitleKey) -> Ordering {
    a.cmp(b)
}

/// Items of `library` in display order for `mode`.
///
/// Title modes compare lower-cased titles with accents folded into their
/// base letter; songs missing from `titles` sort as an empty title. Equal
/// keys keep their stored relative order.
pub fn sorted_items<'a>(
    library: &'a Library,
    mode: LibrarySortMode,
    titles: &dyn SongTitles,
) -> Vec<&'a LibraryItem> {
    let mut items: Vec<&LibraryItem> = library.items.iter().collect();
    match mode {
        LibrarySortMode::AddedNewest => items.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
        LibrarySortMode::AddedOldest => items.sort_by(|a, b| a.added_at.cmp(&b.added_at)),
        LibrarySortMode::TitleAsc | LibrarySortMode::TitleDesc => {
            let mut keyed: Vec<(TitleKey, &LibraryItem)> = items
                .into_iter()
                .map(|it| (TitleKey::new(titles.title_of(&it.song_id).unwrap_or("")), it))
                .collect();
            if mode == LibrarySortMode::TitleAsc {
                keyed.sort_by(|a, b| compare_titles(&a.0, &b.0));
            } else {
                keyed.sort_by(|a, b| compare_titles(&b.0, &a.0));
            }
            items = keyed.into_iter().map(|(_, it)| it).collect();
        }
    }
    items
}
