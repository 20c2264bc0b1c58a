use clap::{Parser, Subcommand};

use crate::library::LibrarySortMode;

/// Songbook - lyrics, favourites and song libraries in your terminal 🎵
#[derive(Parser, Debug)]
#[command(name = "songbook", version, about)]
pub struct Args {
    /// Also log to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Directory holding persisted data (overrides config.toml)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Song catalog JSON file (defaults to the bundled catalog)
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    /// Generate default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List songs, optionally filtered by QUERY (recorded in search history)
    Songs {
        query: Option<String>,
        /// Rank titles by fuzzy match instead of substring search
        #[arg(long)]
        fuzzy: bool,
    },
    /// Print a song's lyrics and mark it as recently viewed
    Show { song_id: String },
    /// Toggle a song as favourite
    Fav { song_id: String },
    /// List favourite songs
    Favs,
    /// List recently viewed songs
    Recents {
        #[arg(long)]
        clear: bool,
    },
    /// Manage libraries
    #[command(subcommand)]
    Lib(LibCommand),
    /// Manage search history
    #[command(subcommand)]
    History(HistoryCommand),
    /// Delete every persisted collection
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum LibCommand {
    List,
    Create { name: String },
    Rename { id: String, name: String },
    Delete { id: String },
    Add { id: String, song_id: String },
    Remove { id: String, song_id: String },
    /// Move the item at FROM to TO (0-based, stored order)
    Move {
        id: String,
        #[arg(allow_negative_numbers = true)]
        from: i64,
        #[arg(allow_negative_numbers = true)]
        to: i64,
    },
    /// Set display order: TITLE_ASC, TITLE_DESC, ADDED_NEWEST, ADDED_OLDEST
    Sort { id: String, mode: LibrarySortMode },
    /// Show a library's songs in its display order
    Show { id: String },
    /// Songs matching QUERY that could be added to a library
    Candidates { id: String, query: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    List,
    Add { query: String },
    Remove { query: String },
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lib_move_with_negative_index() {
        let args = Args::try_parse_from(["songbook", "lib", "move", "abc", "-1", "0"]).unwrap();
        match args.command {
            Some(Command::Lib(LibCommand::Move { id, from, to })) => {
                assert_eq!(id, "abc");
                assert_eq!(from, -1);
                assert_eq!(to, 0);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sort_mode() {
        let args = Args::try_parse_from(["songbook", "lib", "sort", "abc", "title-desc"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Lib(LibCommand::Sort { mode: LibrarySortMode::TitleDesc, .. }))
        ));
        assert!(Args::try_parse_from(["songbook", "lib", "sort", "abc", "random"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["songbook", "favs", "--data-dir", "/tmp/x", "-v"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.data_dir.as_deref(), Some("/tmp/x"));
    }
}
