mod catalog;
mod display;
mod playback;
mod player;
mod tui;

#[cfg(test)]
mod tests;

use std::sync::mpsc;

use anyhow::{Result, anyhow};

use crate::cli::{Cli, Command};
use crate::paths::database_file_path;
use crate::store::Store;

use self::catalog::CatalogClient;
use self::display::{
    format_position_display, format_progress_text, format_updated_display, truncate,
};
use self::playback::{
    HistoryLedger, MediaSummary, MediaType, PlaybackStateMachine, build_embed_url,
    decode_player_message, load_bookmarks, load_history, resume_position, save_history,
};
use self::player::launch_player;

pub fn run(cli: Cli) -> Result<()> {
    let store = open_store()?;

    match cli.command {
        Some(Command::Search { query }) => run_search(&query)?,
        Some(Command::Watch {
            media_id,
            media_type,
            season,
            episode,
        }) => run_watch(&store, &media_id, &media_type, season, episode)?,
        Some(Command::History) => run_history(&store)?,
        Some(Command::Bookmarks) => run_bookmarks(&store)?,
        Some(Command::Tui) | None => tui::run_tui(&store)?,
    }

    Ok(())
}

fn open_store() -> Result<Store> {
    let db_path = database_file_path()?;
    let store = Store::open(&db_path)?;
    store.migrate()?;
    Ok(store)
}

fn run_search(query: &str) -> Result<()> {
    let catalog = CatalogClient::from_env()?;
    let results = catalog.search(query)?;
    if results.is_empty() {
        println!("No titles matched `{query}`.");
        return Ok(());
    }

    println!("{:<10} {:<6} {:<48} {:<6} {:<6}", "ID", "TYPE", "TITLE", "YEAR", "RATING");
    for media in results {
        println!(
            "{:<10} {:<6} {:<48} {:<6} {:<6}",
            media.id,
            media.media_type.as_str(),
            truncate(&media.title, 48),
            media.release_year().unwrap_or("-"),
            media
                .vote_average
                .map(|rating| format!("{rating:.1}"))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn run_history(store: &Store) -> Result<()> {
    let read = load_history(store)?;
    for warning in &read.warnings {
        eprintln!("Warning: {warning}");
    }
    if read.ledger.entries().is_empty() {
        println!("No watch history yet. Run `vidtrack watch` or the TUI first.");
        return Ok(());
    }

    println!(
        "{:<10} {:<6} {:<40} {:<8} {:<22} {:<18}",
        "ID", "TYPE", "TITLE", "POS", "PROGRESS", "UPDATED"
    );
    for entry in read.ledger.entries() {
        println!(
            "{:<10} {:<6} {:<40} {:<8} {:<22} {:<18}",
            entry.id,
            entry.media_type.as_str(),
            truncate(&entry.title, 40),
            format_position_display(entry),
            format_progress_text(entry),
            format_updated_display(entry.updated_at_ms),
        );
    }
    Ok(())
}

fn run_bookmarks(store: &Store) -> Result<()> {
    let read = load_bookmarks(store)?;
    for warning in &read.warnings {
        eprintln!("Warning: {warning}");
    }
    if read.bookmarks.items().is_empty() {
        println!("No bookmarks yet. Press `b` on a title in the TUI to add one.");
        return Ok(());
    }

    println!("{:<10} {:<6} {:<48}", "ID", "TYPE", "TITLE");
    for bookmark in read.bookmarks.items() {
        println!(
            "{:<10} {:<6} {:<48}",
            bookmark.id,
            bookmark.media_type.as_str(),
            truncate(&bookmark.title, 48),
        );
    }
    Ok(())
}

/// Headless playback: launch the player for one title and follow its event
/// stream until the process exits, recording progress along the way.
fn run_watch(
    store: &Store,
    media_id: &str,
    media_type_raw: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> Result<()> {
    let media_type = MediaType::parse(media_type_raw)
        .ok_or_else(|| anyhow!("unknown media type `{media_type_raw}` (expected movie or tv)"))?;

    let history_read = load_history(store)?;
    for warning in &history_read.warnings {
        eprintln!("Warning: {warning}");
    }
    let mut ledger = history_read.ledger;

    let media = lookup_media(media_id, media_type);
    let (seed_season, seed_episode) = seed_position(&ledger, media_id, media_type, season, episode);

    let mut machine = PlaybackStateMachine::new();
    machine.select_media(media, seed_season, seed_episode);
    let session = machine
        .session()
        .ok_or_else(|| anyhow!("no playback session after selection"))?;

    let resume = resume_position(
        &ledger,
        media_id,
        media_type,
        (media_type == MediaType::Tv).then_some(session.season),
        (media_type == MediaType::Tv).then_some(session.episode),
    );
    let url = build_embed_url(media_id, media_type, session.season, session.episode, resume);

    println!("Launching player:");
    println!("  Title: {}", session.media.title);
    if media_type == MediaType::Tv {
        println!("  Position: S{}.E{}", session.season, session.episode);
    }
    if resume > 0 {
        println!("  Resuming at {resume}s");
    }
    println!("  URL: {url}");

    let (tx, rx) = mpsc::channel::<String>();
    let mut handle = launch_player(&url, tx)?;

    // The receive loop ends when the reader thread drops the sender, i.e.
    // when the player process closes its stdout.
    let mut writes = 0_usize;
    for line in rx {
        let Some(event) = decode_player_message(&line) else {
            continue;
        };
        let outcome = machine.on_player_event(event);
        if outcome.navigated
            && let Some(session) = machine.session()
        {
            println!("Player moved to S{}.E{}", session.season, session.episode);
        }
        if let Some(entry) = outcome.history {
            ledger.merge(entry);
            save_history(store, &ledger)?;
            writes += 1;
        }
    }
    handle.wait()?;

    match ledger.latest_for(media_id, media_type) {
        Some(entry) if writes > 0 => println!(
            "Recorded progress: {} | {}",
            entry.title,
            format_progress_text(entry)
        ),
        _ => println!("Player exited without reporting progress. History unchanged."),
    }
    Ok(())
}

/// Best-effort catalog lookup so ledger entries carry a real title; without
/// an API key the id stands in and playback still works.
fn lookup_media(media_id: &str, media_type: MediaType) -> MediaSummary {
    let fetched = CatalogClient::from_env().and_then(|catalog| catalog.details(media_id, media_type));
    match fetched {
        Ok(details) => details.summary,
        Err(err) => {
            eprintln!("Warning: catalog lookup failed: {err}");
            MediaSummary {
                id: media_id.to_string(),
                media_type,
                title: media_id.to_string(),
                poster_path: None,
                vote_average: None,
                release_date: None,
                overview: None,
            }
        }
    }
}

/// Explicit flags win; otherwise a TV show reopens at its most recent
/// history position, else S1.E1.
fn seed_position(
    ledger: &HistoryLedger,
    media_id: &str,
    media_type: MediaType,
    season: Option<u32>,
    episode: Option<u32>,
) -> (u32, u32) {
    if media_type == MediaType::Movie {
        return (1, 1);
    }
    if let (Some(season), Some(episode)) = (season, episode) {
        return (season, episode);
    }
    let latest = ledger.latest_for(media_id, media_type);
    (
        season
            .or_else(|| latest.and_then(|entry| entry.season))
            .unwrap_or(1),
        episode
            .or_else(|| latest.and_then(|entry| entry.episode))
            .unwrap_or(1),
    )
}
