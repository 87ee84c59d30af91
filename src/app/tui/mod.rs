mod actions;
mod render;
mod session;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::store::Store;

use super::catalog::{CatalogClient, EpisodeInfo, MediaDetails};
use super::playback::{
    BookmarkList, HistoryLedger, MediaSummary, MediaType, PlaybackEvent, PlaybackStateMachine,
    load_bookmarks, load_history,
};
use super::player::PlayerHandle;

use self::actions::{
    close_watch, drain_fetch_outcomes, drain_player_lines, ensure_tab_data, ensure_watch_data,
    open_media, session_media, spawn_episode_fetch, spawn_search, status_error, status_info,
    step_season, sync_player, toggle_bookmark, visible_media,
};
use self::render::draw;
use self::session::TerminalGuard;

pub(super) const EVENT_FEED_CAP: usize = 10;
const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Screen {
    Browse,
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum Tab {
    Home,
    Movies,
    Tv,
    History,
    Bookmarks,
}

impl Tab {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Home => "HOME",
            Self::Movies => "MOVIES",
            Self::Tv => "TV SHOWS",
            Self::History => "CONTINUE WATCHING",
            Self::Bookmarks => "MY LIST",
        }
    }

    pub(super) fn all() -> [Self; 5] {
        [Self::Home, Self::Movies, Self::Tv, Self::History, Self::Bookmarks]
    }

    pub(super) fn move_left(self) -> Self {
        match self {
            Self::Home => Self::Home,
            Self::Movies => Self::Home,
            Self::Tv => Self::Movies,
            Self::History => Self::Tv,
            Self::Bookmarks => Self::History,
        }
    }

    pub(super) fn move_right(self) -> Self {
        match self {
            Self::Home => Self::Movies,
            Self::Movies => Self::Tv,
            Self::Tv => Self::History,
            Self::History => Self::Bookmarks,
            Self::Bookmarks => Self::Bookmarks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Ranking {
    Popular,
    TopRated,
}

impl Ranking {
    pub(super) fn toggled(self) -> Self {
        match self {
            Self::Popular => Self::TopRated,
            Self::TopRated => Self::Popular,
        }
    }

    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Popular => "Popular",
            Self::TopRated => "Top Rated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum RowKey {
    Trending,
    PopularMovies,
    TopRatedMovies,
    PopularTv,
    TopRatedTv,
}

#[derive(Debug, Clone)]
pub(super) enum RowState {
    Loading,
    Ready(Vec<MediaSummary>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub(super) enum DetailsState {
    Loading,
    Ready(Box<MediaDetails>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub(super) enum EpisodeListState {
    Loading,
    Ready {
        episodes: Vec<EpisodeInfo>,
        warning: Option<String>,
    },
}

impl EpisodeListState {
    pub(super) fn episodes(&self) -> Option<&[EpisodeInfo]> {
        match self {
            Self::Ready { episodes, .. } => Some(episodes.as_slice()),
            Self::Loading => None,
        }
    }
}

/// Results posted back from fetch threads. Search and episode results carry
/// the identity they were issued for; the drain step discards anything that
/// no longer matches the current state.
#[derive(Debug)]
pub(super) enum FetchOutcome {
    Row {
        key: RowKey,
        result: Result<Vec<MediaSummary>, String>,
    },
    Search {
        query: String,
        result: Result<Vec<MediaSummary>, String>,
    },
    Details {
        media_id: String,
        media_type: MediaType,
        result: Result<Box<MediaDetails>, String>,
    },
    Episodes {
        media_id: String,
        season: u32,
        episodes: Vec<EpisodeInfo>,
        warning: Option<String>,
    },
}

pub(super) struct TuiState {
    pub(super) screen: Screen,
    pub(super) tab: Tab,
    pub(super) ranking: Ranking,
    pub(super) rows: HashMap<RowKey, RowState>,
    pub(super) search_input: Option<String>,
    pub(super) search_query: String,
    pub(super) search_results: Option<Vec<MediaSummary>>,
    pub(super) table_state: TableState,
    pub(super) status: String,
    pub(super) machine: PlaybackStateMachine,
    pub(super) ledger: HistoryLedger,
    pub(super) bookmarks: BookmarkList,
    pub(super) details: HashMap<(String, MediaType), DetailsState>,
    pub(super) episode_lists: HashMap<(String, u32), EpisodeListState>,
    pub(super) episode_cursor: usize,
    pub(super) recent_events: Vec<(String, PlaybackEvent)>,
    pub(super) player: Option<PlayerHandle>,
    pub(super) player_token: u64,
}

pub(crate) fn run_tui(store: &Store) -> Result<()> {
    let history_read = load_history(store)?;
    let bookmarks_read = load_bookmarks(store)?;
    let catalog = CatalogClient::from_env().ok().map(Arc::new);

    let mut startup_notes: Vec<String> = Vec::new();
    startup_notes.extend(history_read.warnings);
    startup_notes.extend(bookmarks_read.warnings);
    if catalog.is_none() {
        startup_notes.push("TMDB_API_KEY not set; catalog browsing disabled.".to_string());
    }

    let mut guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let (fetch_tx, fetch_rx) = mpsc::channel::<FetchOutcome>();
    let (player_tx, player_rx) = mpsc::channel::<String>();

    let mut state = TuiState {
        screen: Screen::Browse,
        tab: Tab::Home,
        ranking: Ranking::Popular,
        rows: HashMap::new(),
        search_input: None,
        search_query: String::new(),
        search_results: None,
        table_state: TableState::default(),
        status: if startup_notes.is_empty() {
            status_info("Ready.")
        } else {
            status_error(&startup_notes.join(" | "))
        },
        machine: PlaybackStateMachine::new(),
        ledger: history_read.ledger,
        bookmarks: bookmarks_read.bookmarks,
        details: HashMap::new(),
        episode_lists: HashMap::new(),
        episode_cursor: 0,
        recent_events: Vec::new(),
        player: None,
        player_token: 0,
    };

    loop {
        drain_player_lines(&mut state, store, &player_rx, catalog.as_ref(), &fetch_tx);
        drain_fetch_outcomes(&mut state, &fetch_rx);
        ensure_tab_data(&mut state, catalog.as_ref(), &fetch_tx);
        ensure_watch_data(&mut state, catalog.as_ref(), &fetch_tx);
        sync_player(&mut state, &player_tx);

        terminal.draw(|frame| draw(frame, &mut state))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let quit = match state.screen {
            Screen::Browse => {
                handle_browse_key(&mut state, store, key.code, catalog.as_ref(), &fetch_tx)
            }
            Screen::Watch => handle_watch_key(&mut state, store, key.code, catalog.as_ref(), &fetch_tx),
        };
        if quit {
            break;
        }
    }

    if let Some(mut player) = state.player.take() {
        player.stop();
    }
    terminal.show_cursor()?;
    guard.restore()?;
    Ok(())
}

fn handle_browse_key(
    state: &mut TuiState,
    store: &Store,
    code: KeyCode,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) -> bool {
    if state.search_input.is_some() {
        handle_search_input_key(state, code, catalog, fetch_tx);
        return false;
    }

    match code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') | KeyCode::Char('s') => {
            state.search_input = Some(String::new());
            state.status = status_info("Type a query, Enter to search, Esc to cancel.");
        }
        KeyCode::Esc => {
            if state.search_results.is_some() {
                state.search_results = None;
                state.search_query.clear();
                state.table_state.select(Some(0));
                state.status = status_info("Search cleared.");
            }
        }
        KeyCode::Left => {
            state.tab = state.tab.move_left();
            state.table_state.select(Some(0));
        }
        KeyCode::Right => {
            state.tab = state.tab.move_right();
            state.table_state.select(Some(0));
        }
        KeyCode::Char('t') => {
            if matches!(state.tab, Tab::Movies | Tab::Tv) {
                state.ranking = state.ranking.toggled();
                state.table_state.select(Some(0));
                state.status = status_info(&format!("Showing {} titles.", state.ranking.label()));
            }
        }
        KeyCode::Up => {
            if let Some(selected) = state.table_state.selected() {
                state.table_state.select(Some(selected.saturating_sub(1)));
            }
        }
        KeyCode::Down => {
            let len = visible_media(state).len();
            if let Some(selected) = state.table_state.selected()
                && len > 0
            {
                state.table_state.select(Some((selected + 1).min(len - 1)));
            }
        }
        KeyCode::Char('b') => {
            let Some(media) = selected_media(state) else {
                state.status = status_error("Nothing selected to bookmark.");
                return false;
            };
            toggle_bookmark(state, store, &media);
        }
        KeyCode::Enter => {
            let Some(media) = selected_media(state) else {
                return false;
            };
            open_media(state, media, catalog, fetch_tx);
        }
        _ => {}
    }
    false
}

fn handle_search_input_key(
    state: &mut TuiState,
    code: KeyCode,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let Some(input) = state.search_input.as_mut() else {
        return;
    };
    match code {
        KeyCode::Esc => {
            state.search_input = None;
            state.status = status_info("Search canceled.");
        }
        KeyCode::Enter => {
            let query = input.trim().to_string();
            state.search_input = None;
            if query.chars().count() < MIN_SEARCH_LEN {
                state.status = status_error("Search needs at least 2 characters.");
            } else if let Some(catalog) = catalog {
                state.search_query = query.clone();
                state.search_results = None;
                state.table_state.select(Some(0));
                spawn_search(catalog, query, fetch_tx);
                state.status = status_info("Searching...");
            } else {
                state.status = status_error("Catalog unavailable: TMDB_API_KEY not set.");
            }
        }
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(ch) => input.push(ch),
        _ => {}
    }
}

fn handle_watch_key(
    state: &mut TuiState,
    store: &Store,
    code: KeyCode,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) -> bool {
    match code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => close_watch(state),
        KeyCode::Char('b') => {
            if let Some(media) = session_media(state) {
                toggle_bookmark(state, store, &media);
            }
        }
        KeyCode::Char('n') => step_episode(state, 1, catalog, fetch_tx),
        KeyCode::Char('p') => step_episode(state, -1, catalog, fetch_tx),
        KeyCode::Char(']') => step_season(state, 1, catalog, fetch_tx),
        KeyCode::Char('[') => step_season(state, -1, catalog, fetch_tx),
        KeyCode::Char('r') => relaunch_player(state, catalog, fetch_tx),
        KeyCode::Up => {
            state.episode_cursor = state.episode_cursor.saturating_sub(1);
        }
        KeyCode::Down => {
            if let Some(len) = current_episode_count(state)
                && len > 0
            {
                state.episode_cursor = (state.episode_cursor + 1).min(len - 1);
            }
        }
        KeyCode::Enter => {
            let Some(session) = state.machine.session() else {
                return false;
            };
            if session.media.media_type != MediaType::Tv {
                return false;
            }
            let key = (session.media.id.clone(), session.season);
            let target = state
                .episode_lists
                .get(&key)
                .and_then(EpisodeListState::episodes)
                .and_then(|episodes| episodes.get(state.episode_cursor))
                .map(|episode| episode.number);
            if let Some(number) = target {
                state.machine.select_episode(number);
                state.status = status_info(&format!("Playing episode {number}."));
            }
        }
        _ => {}
    }
    false
}

fn step_episode(
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
    let current = i64::from(session.episode);
    let target = current + delta;
    if target < 1 {
        state.status = status_info("Already at the first episode.");
        return;
    }
    if let Some(count) = current_episode_count(state)
        && target > count as i64
    {
        state.status = status_info("No more episodes in this season.");
        return;
    }
    let outcome = state.machine.select_episode(target as u32);
    if let Some(fetch) = outcome.fetch {
        spawn_episode_fetch(state, &fetch, catalog, fetch_tx);
    }
    state.episode_cursor = (target as usize).saturating_sub(1);
    state.status = status_info(&format!("Playing episode {target}."));
}

fn relaunch_player(
    state: &mut TuiState,
    catalog: Option<&Arc<CatalogClient>>,
    fetch_tx: &mpsc::Sender<FetchOutcome>,
) {
    let Some(session) = state.machine.session() else {
        return;
    };
    // Re-selecting the current position is an app-initiated transition, so
    // the token bumps and the player relaunches on the next tick.
    if session.media.media_type == MediaType::Tv {
        let episode = session.episode;
        state.machine.select_episode(episode);
    } else {
        let media = session.media.clone();
        let outcome = state.machine.select_media(media, 1, 1);
        if let Some(fetch) = outcome.fetch {
            spawn_episode_fetch(state, &fetch, catalog, fetch_tx);
        }
    }
    state.status = status_info("Reloading player.");
}

fn current_episode_count(state: &TuiState) -> Option<usize> {
    let session = state.machine.session()?;
    let key = (session.media.id.clone(), session.season);
    state
        .episode_lists
        .get(&key)
        .and_then(EpisodeListState::episodes)
        .map(<[EpisodeInfo]>::len)
}

fn selected_media(state: &TuiState) -> Option<MediaSummary> {
    let items = visible_media(state);
    let selected = state.table_state.selected()?;
    items.get(selected).cloned()
}
