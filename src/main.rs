use anyhow::{bail, Result};
use clap::Parser;
use tracing::debug;

use songbook::app::cli::{Args, Command, HistoryCommand, LibCommand};
use songbook::app::{logging, App, AppConfig};
use songbook::catalog::Song;

fn print_songs<'a>(songs: impl IntoIterator<Item = &'a Song>) {
    let mut any = false;
    for song in songs {
        any = true;
        println!("{:<24} {}", song.id, song.title);
    }
    if !any {
        println!("No songs.");
    }
}

fn report(changed: bool, done: &str) {
    if changed {
        println!("{}", done);
    } else {
        println!("Nothing changed.");
    }
}

async fn run_lib(app: &App, command: LibCommand) -> Result<()> {
    match command {
        LibCommand::List => {
            app.libraries.hydrate().await;
            let snapshot = app.libraries.snapshot();
            if snapshot.libraries.is_empty() {
                println!("No libraries yet.");
            }
            for lib in snapshot.libraries.iter() {
                let mode = lib.sort_mode.unwrap_or(app.default_sort_mode);
                println!("{}  {} ({} songs • {})", lib.id, lib.name, lib.items.len(), mode.label());
            }
        }
        LibCommand::Create { name } => {
            let id = app.libraries.create_library(&name).await?;
            println!("{}", id);
        }
        LibCommand::Rename { id, name } => {
            report(app.libraries.rename_library(&id, &name).await?, "Renamed.");
        }
        LibCommand::Delete { id } => {
            report(app.libraries.delete_library(&id).await?, "Deleted.");
        }
        LibCommand::Add { id, song_id } => {
            if app.catalog.song_by_id(&song_id).is_none() {
                bail!("no song with id '{}'", song_id);
            }
            report(app.libraries.add_song_to_library(&id, &song_id).await?, "Added.");
        }
        LibCommand::Remove { id, song_id } => {
            report(app.libraries.remove_song_from_library(&id, &song_id).await?, "Removed.");
        }
        LibCommand::Move { id, from, to } => {
            let changed = app.move_song_at(&id, from, to).await?;
            report(changed, "Moved.");
        }
        LibCommand::Sort { id, mode } => {
            report(app.libraries.set_library_sort_mode(&id, mode).await?, mode.label());
        }
        LibCommand::Show { id } => {
            let Some(view) = app.library_view(&id).await else {
                bail!("Library not found");
            };
            println!(
                "{}  ({} songs • {})",
                view.library.name,
                view.rows.len(),
                view.sort_mode.label()
            );
            for (pos, row) in view.rows.iter().enumerate() {
                println!("{:>3}. {}", pos + 1, row.display_title());
            }
        }
        LibCommand::Candidates { id, query } => {
            app.libraries.hydrate().await;
            let snapshot = app.libraries.snapshot();
            let Some(library) = snapshot.get(&id) else {
                bail!("Library not found");
            };
            for (song, added) in app.catalog.candidates_for(library, query.as_deref().unwrap_or("")) {
                let mark = if added { "Added" } else { "" };
                println!("{:<24} {:<40} {}", song.id, song.title, mark);
            }
        }
    }
    Ok(())
}

async fn run_history(app: &App, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List => {
            app.history.hydrate().await;
            for query in app.history.items().iter() {
                println!("{}", query);
            }
        }
        HistoryCommand::Add { query } => report(app.history.add(&query).await?, "Saved."),
        HistoryCommand::Remove { query } => report(app.history.remove(&query).await?, "Removed."),
        HistoryCommand::Clear => report(app.history.clear().await?, "Cleared."),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        print!("{}", AppConfig::default_config_toml());
        return Ok(());
    }

    let mut config = AppConfig::load();
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(catalog) = args.catalog {
        config.catalog_path = Some(catalog);
    }

    let _log_guard = logging::init(&config.log_level, args.verbose);
    let app = App::open(&config)?;

    let command = args.command.unwrap_or(Command::Songs {
        query: None,
        fuzzy: false,
    });
    debug!(?command, "running");

    match command {
        Command::Songs { query, fuzzy } => match query {
            Some(query) => print_songs(app.search(&query, fuzzy).await?),
            None => print_songs(app.catalog.all_songs()),
        },
        Command::Show { song_id } => {
            let Some(song) = app.view_song(&song_id).await? else {
                bail!("Song not found.");
            };
            let favourite = app.user.is_favourite(&song.id).await;
            println!("{}{}", song.title, if favourite { "  ★" } else { "" });
            if !song.tags.is_empty() {
                println!("{} • {}", song.language, song.tags.join(", "));
            }
            println!();
            println!("{}", song.lyrics);
        }
        Command::Fav { song_id } => {
            let favourites = app.user.toggle_favourite(&song_id).await?;
            if favourites.contains(&song_id) {
                println!("Added to favourites.");
            } else {
                println!("Removed from favourites.");
            }
        }
        Command::Favs => print_songs(app.favourite_songs().await),
        Command::Recents { clear } => {
            if clear {
                app.user.clear_recents().await?;
                println!("Cleared.");
            } else {
                print_songs(app.recent_songs().await);
            }
        }
        Command::Lib(command) => run_lib(&app, command).await?,
        Command::History(command) => run_history(&app, command).await?,
        Command::Reset => {
            app.reset().await?;
            println!("All saved data removed.");
        }
    }

    Ok(())
}
