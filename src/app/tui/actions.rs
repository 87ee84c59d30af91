use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use chrono::Local;

use crate::store::Store;

use super::super::catalog::CatalogClient;
use super::super::playback::{
    EpisodeFetch, MediaSummary, MediaType, build_embed_url, decode_player_message, resume_position,
    save_bookmarks, save_history,
};
use super::super::player::launch_player;
use super::{
    DetailsState, EVENT_FEED_CAP, EpisodeListState, FetchOutcome, Ranking, RowKey, RowState,
    Screen, Tab, TuiState,
};

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// The media list the browse table currently shows. Search results override
/// the active tab while present.
pub(super) fn visible_media(state: &TuiState) -> Vec<MediaSummary> {
    if let Some(results) = &state.search_results {
        return results.clone();
    }
    match state.tab {
        Tab::Home => row_media(state, RowKey::Trending),
        Tab::Movies => row_media(state, movies_row_key(state.ranking)),
        Tab::Tv => row_media(state, tv_row_key(state.ranking)),
        Tab::History => state
            .ledger
            .entries()
            .iter()
            .map(|entry| MediaSummary {
                id: entry.id.clone(),
                media_type: entry.media_type,
                title: entry.title.clone(),
                poster_path: entry.poster_path.clone(),
                vote_average: None,
                release_date: None,
                overview: None,
            })
            .collect(),
        Tab::Bookmarks => state
            .bookmarks
            .items()
            .iter()
            .map(|bookmark| MediaSummary {
                id: bookmark.id.clone(),
                media_type: bookmark.media_type,
                title: bookmark.title.clone(),
                poster_path: bookmark.poster_path.clone(),
                vote_average: None,
                release_date: None,
                overview: None,
            })
            .collect(),
    }
}

fn row_media(state: &TuiState, key: RowKey) -> Vec<MediaSummary> {
    match state.rows.get(&key) {
        Some(RowState::Ready(items)) => items.clone(),
        _ => Vec::new(),
    }
}

pub(super) fn movies_row_key(ranking: Ranking) -> RowKey {
    match ranking {
        Ranking::Popular => RowKey::PopularMovies,
        Ranking::TopRated => RowKey::TopRatedMovies,
    }
}

pub(super) fn tv_row_key(ranking: Ranking) -> RowKey {
    match ranking {
        Ranking::Popular => RowKey::PopularTv,
        Ranking::TopRated => RowKey::TopRatedTv,
    }
}

/// Spawn catalog fetches for whatever the active tab needs and does not
/// have yet.
pub(super) fn ensure_tab_data(
    state: &mut TuiState,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let needed = match state.tab {
        Tab::Home => Some(RowKey::Trending),
        Tab::Movies => Some(movies_row_key(state.ranking)),
        Tab::Tv => Some(tv_row_key(state.ranking)),
        Tab::History | Tab::Bookmarks => None,
    };
    let Some(key) = needed else {
        clamp_selection(state);
        return;
    };
    if !state.rows.contains_key(&key) {
        match catalog {
            Some(catalog) => {
                state.rows.insert(key, RowState::Loading);
                spawn_row_fetch(catalog, key, fetch_tx);
            }
            None => {
                state
                    .rows
                    .insert(key, RowState::Failed("TMDB_API_KEY not set".to_string()));
            }
        }
    }
    clamp_selection(state);
}

fn clamp_selection(state: &mut TuiState) {
    let len = visible_media(state).len();
    if len == 0 {
        state.table_state.select(None);
        return;
    }
    match state.table_state.selected() {
        Some(selected) => state.table_state.select(Some(selected.min(len - 1))),
        None => state.table_state.select(Some(0)),
    }
}

/// Spawn details/episode fetches for the current session when missing.
pub(super) fn ensure_watch_data(
    state: &mut TuiState,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    if state.screen != Screen::Watch {
        return;
    }
    let Some(session) = state.machine.session() else {
        return;
    };
    let media_id = session.media.id.clone();
    let media_type = session.media.media_type;
    let season = session.season;

    let details_key = (media_id.clone(), media_type);
    if !state.details.contains_key(&details_key) {
        match catalog {
            Some(catalog) => {
                state.details.insert(details_key, DetailsState::Loading);
                spawn_details_fetch(catalog, media_id.clone(), media_type, fetch_tx);
            }
            None => {
                state
                    .details
                    .insert(details_key, DetailsState::Failed("catalog unavailable".to_string()));
            }
        }
    }

    if media_type == MediaType::Tv {
        let fetch = EpisodeFetch { media_id, season };
        spawn_episode_fetch(state, &fetch, catalog, fetch_tx);
    }
}

fn spawn_row_fetch(catalog: &Arc<CatalogClient>, key: RowKey, fetch_tx: &mpsc::Sender<FetchOutcome>) {
    let catalog = Arc::clone(catalog);
    let tx = fetch_tx.clone();
    thread::spawn(move || {
        let result = match key {
            RowKey::Trending => catalog.trending(),
            RowKey::PopularMovies => catalog.popular_movies(),
            RowKey::TopRatedMovies => catalog.top_rated_movies(),
            RowKey::PopularTv => catalog.popular_tv(),
            RowKey::TopRatedTv => catalog.top_rated_tv(),
        };
        let _ = tx.send(FetchOutcome::Row {
            key,
            result: result.map_err(|err| err.to_string()),
        });
    });
}

pub(super) fn spawn_search(
    catalog: &Arc<CatalogClient>,
    query: String,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let catalog = Arc::clone(catalog);
    let tx = fetch_tx.clone();
    thread::spawn(move || {
        let result = catalog.search(&query).map_err(|err| err.to_string());
        let _ = tx.send(FetchOutcome::Search { query, result });
    });
}

fn spawn_details_fetch(
    catalog: &Arc<CatalogClient>,
    media_id: String,
    media_type: MediaType,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let catalog = Arc::clone(catalog);
    let tx = fetch_tx.clone();
    thread::spawn(move || {
        let result = catalog
            .details(&media_id, media_type)
            .map(Box::new)
            .map_err(|err| err.to_string());
        let _ = tx.send(FetchOutcome::Details {
            media_id,
            media_type,
            result,
        });
    });
}

/// Issue an episode-list fetch unless one for this exact `(id, season)` is
/// already pending or done. Results land under the same key, so a late
/// response can never attach to a different season or title.
pub(super) fn spawn_episode_fetch(
    state: &mut TuiState,
    fetch: &EpisodeFetch,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let key = (fetch.media_id.clone(), fetch.season);
    if state.episode_lists.contains_key(&key) {
        return;
    }
    let Some(catalog) = catalog else {
        state.episode_lists.insert(
            key,
            EpisodeListState::Ready {
                episodes: Vec::new(),
                warning: Some("catalog unavailable".to_string()),
            },
        );
        return;
    };

    state.episode_lists.insert(key, EpisodeListState::Loading);
    let catalog = Arc::clone(catalog);
    let media_id = fetch.media_id.clone();
    let season = fetch.season;
    let tx = fetch_tx.clone();
    thread::spawn(move || {
        // Upstream failure degrades to an empty list; playback never blocks
        // on episode metadata.
        let (episodes, warning) = match catalog.episodes(&media_id, season) {
            Ok(episodes) => (episodes, None),
            Err(err) => (Vec::new(), Some(err.to_string())),
        };
        let _ = tx.send(FetchOutcome::Episodes {
            media_id,
            season,
            episodes,
            warning,
        });
    });
}

pub(super) fn drain_fetch_outcomes(state: &mut TuiState, fetch_rx: &mpsc::Receiver<FetchOutcome>) {
    while let Ok(outcome) = fetch_rx.try_recv() {
        match outcome {
            FetchOutcome::Row { key, result } => {
                let row_state = match result {
                    Ok(items) => RowState::Ready(items),
                    Err(err) => RowState::Failed(err),
                };
                state.rows.insert(key, row_state);
            }
            FetchOutcome::Search { query, result } => {
                // A result for a superseded query is stale; drop it.
                if query != state.search_query {
                    continue;
                }
                match result {
                    Ok(items) => {
                        state.status = status_info(&format!(
                            "{} result(s) for `{query}`.",
                            items.len()
                        ));
                        state.search_results = Some(items);
                        state.table_state.select(Some(0));
                    }
                    Err(err) => state.status = status_error(&format!("Search failed: {err}")),
                }
            }
            FetchOutcome::Details {
                media_id,
                media_type,
                result,
            } => {
                let details_state = match result {
                    Ok(details) => DetailsState::Ready(details),
                    Err(err) => DetailsState::Failed(err),
                };
                state.details.insert((media_id, media_type), details_state);
            }
            FetchOutcome::Episodes {
                media_id,
                season,
                episodes,
                warning,
            } => {
                state
                    .episode_lists
                    .insert((media_id, season), EpisodeListState::Ready { episodes, warning });
            }
        }
    }
}

/// Feed every line the player printed since the last tick through the
/// bridge and the state machine. Runs on every tick regardless of screen:
/// a torn-down session leaves the machine idle, which drops stray events.
pub(super) fn drain_player_lines(
    state: &mut TuiState,
    store: &Store,
    player_rx: &mpsc::Receiver<String>,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    while let Ok(line) = player_rx.try_recv() {
        let Some(event) = decode_player_message(&line) else {
            continue;
        };

        state
            .recent_events
            .insert(0, (Local::now().format("%H:%M:%S").to_string(), event.clone()));
        state.recent_events.truncate(EVENT_FEED_CAP);

        let outcome = state.machine.on_player_event(event);
        if outcome.navigated
            && let Some(session) = state.machine.session()
        {
            state.episode_cursor = (session.episode as usize).saturating_sub(1);
            state.status = status_info(&format!(
                "Player moved to S{}.E{}",
                session.season, session.episode
            ));
        }
        if let Some(fetch) = outcome.fetch {
            spawn_episode_fetch(state, &fetch, catalog, fetch_tx);
        }
        if let Some(entry) = outcome.history {
            state.ledger.merge(entry);
            if let Err(err) = save_history(store, &state.ledger) {
                state.status = status_error(&format!("History write failed: {err}"));
            }
        }
    }
}

/// Relaunch the player whenever the session's reload token has moved past
/// the one the running player was launched with. Player-initiated
/// navigation leaves the token alone, so this never fires for it.
pub(super) fn sync_player(state: &mut TuiState, player_tx: &mpsc::Sender<String>) {
    let Some(session) = state.machine.session() else {
        return;
    };
    if session.reload_token == state.player_token {
        return;
    }

    let media_id = session.media.id.clone();
    let media_type = session.media.media_type;
    let season = session.season;
    let episode = session.episode;
    let token = session.reload_token;

    let (season_key, episode_key) = match media_type {
        MediaType::Tv => (Some(season), Some(episode)),
        MediaType::Movie => (None, None),
    };
    let resume = resume_position(&state.ledger, &media_id, media_type, season_key, episode_key);
    let url = build_embed_url(&media_id, media_type, season, episode, resume);

    if let Some(mut old) = state.player.take() {
        old.stop();
    }
    // Mark the token handled even on failure so a broken player command
    // does not relaunch every tick.
    state.player_token = token;
    match launch_player(&url, player_tx.clone()) {
        Ok(handle) => state.player = Some(handle),
        Err(err) => state.status = status_error(&format!("Player launch failed: {err}")),
    }
}

pub(super) fn open_media(
    state: &mut TuiState,
    media: MediaSummary,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    // A reopened show resumes at its most recent history position.
    let (season, episode) = match media.media_type {
        MediaType::Tv => state
            .ledger
            .latest_for(&media.id, MediaType::Tv)
            .map(|entry| (entry.season.unwrap_or(1), entry.episode.unwrap_or(1)))
            .unwrap_or((1, 1)),
        MediaType::Movie => (1, 1),
    };

    let title = media.title.clone();
    let outcome = state.machine.select_media(media, season, episode);
    if let Some(fetch) = outcome.fetch {
        spawn_episode_fetch(state, &fetch, catalog, fetch_tx);
    }
    state.screen = Screen::Watch;
    state.episode_cursor = (episode as usize).saturating_sub(1);
    state.recent_events.clear();
    state.status = status_info(&format!("Playing {title}."));
}

pub(super) fn close_watch(state: &mut TuiState) {
    if let Some(mut player) = state.player.take() {
        player.stop();
    }
    state.machine.clear();
    state.player_token = 0;
    state.screen = Screen::Browse;
    state.recent_events.clear();
    state.status = status_info("Back to browse.");
}

pub(super) fn session_media(state: &TuiState) -> Option<MediaSummary> {
    state.machine.session().map(|session| session.media.clone())
}

pub(super) fn toggle_bookmark(state: &mut TuiState, store: &Store, media: &MediaSummary) {
    let added = state.bookmarks.toggle(media);
    match save_bookmarks(store, &state.bookmarks) {
        Ok(()) => {
            state.status = if added {
                status_info(&format!("Bookmarked {}.", media.title))
            } else {
                status_info(&format!("Removed bookmark for {}.", media.title))
            };
        }
        Err(err) => state.status = status_error(&format!("Bookmark write failed: {err}")),
    }
}

pub(super) fn step_season(
    state: &mut TuiState,
    delta: i64,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let Some(session) = state.machine.session() else {
        return;
    };
    if session.media.media_type != MediaType::Tv {
        return;
    }
    let media_id = session.media.id.clone();
    let current = session.season;

    // Prefer the catalog's real season list; fall back to plain stepping
    // while details are still loading.
    let seasons: Option<Vec<u32>> = match state.details.get(&(media_id, MediaType::Tv)) {
        Some(DetailsState::Ready(details)) if !details.season_numbers.is_empty() => {
            Some(details.season_numbers.clone())
        }
        _ => None,
    };

    let target = match seasons {
        Some(seasons) => {
            let position = seasons.iter().position(|&season| season == current);
            let next = match (position, delta > 0) {
                (Some(idx), true) => seasons.get(idx + 1).copied(),
                (Some(idx), false) if idx > 0 => seasons.get(idx - 1).copied(),
                (Some(_), false) => None,
                (None, _) => seasons.first().copied(),
            };
            let Some(season) = next else {
                state.status = status_info("No more seasons that way.");
                return;
            };
            season
        }
        None => {
            let stepped = i64::from(current) + delta;
            if stepped < 1 {
                state.status = status_info("Already at the first season.");
                return;
            }
            stepped as u32
        }
    };

    let outcome = state.machine.select_season(target);
    if let Some(fetch) = outcome.fetch {
        spawn_episode_fetch(state, &fetch, catalog, fetch_tx);
    }
    state.episode_cursor = 0;
    state.status = status_info(&format!("Season {target}, episode 1."));
}
