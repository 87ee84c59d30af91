use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Wrap,
};

use super::super::display::{format_clock, truncate};
use super::super::playback::{
    HistoryLedger, MediaSummary, MediaType, PlaybackEvent, PlaybackSession, is_finished,
    progress_ratio,
};
use super::actions::visible_media;
use super::{DetailsState, EpisodeListState, RowKey, RowState, Screen, Tab, TuiState};

pub(super) fn draw(frame: &mut Frame, state: &mut TuiState) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    match state.screen {
        Screen::Browse => draw_browse(frame, state),
        Screen::Watch => draw_watch(frame, state),
    }
}

fn draw_browse(frame: &mut Frame, state: &mut TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(browse_header(state), chunks[0]);
    frame.render_widget(search_bar(state), chunks[1]);
    draw_media_table(frame, state, chunks[2]);
    let controls = Paragraph::new(
        "←/→ tabs   ↑/↓ move   Enter play   / search   b bookmark   t ranking   q quit",
    )
    .style(dim_text())
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[3]);
    frame.render_widget(status_widget(&state.status), chunks[4]);
}

fn browse_header(state: &TuiState) -> Paragraph<'static> {
    let mut spans = vec![
        Span::styled(
            "VIDTRACK",
            Style::default()
                .fg(Color::Rgb(129, 140, 248))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ", Style::default()),
    ];
    for tab in Tab::all() {
        spans.push(Span::styled(
            format!(" {} ", tab.label()),
            pill_style(tab == state.tab),
        ));
        spans.push(Span::styled(" ", Style::default()));
    }
    if matches!(state.tab, Tab::Movies | Tab::Tv) {
        spans.push(Span::styled(
            format!("  [{}]", state.ranking.label()),
            Style::default().fg(Color::Yellow),
        ));
    }
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(panel_block("Catalog"))
}

fn search_bar(state: &TuiState) -> Paragraph<'static> {
    let text = match (&state.search_input, &state.search_results) {
        (Some(input), _) => format!("> {input}▏"),
        (None, Some(results)) => format!(
            "{} result(s) for `{}` — Esc to clear",
            results.len(),
            state.search_query
        ),
        (None, None) => "Press / to search movies and TV shows".to_string(),
    };
    let style = if state.search_input.is_some() {
        Style::default().fg(Color::Rgb(230, 235, 242))
    } else {
        dim_text()
    };
    Paragraph::new(text).style(style).block(panel_block("Search"))
}

fn draw_media_table(frame: &mut Frame, state: &mut TuiState, area: Rect) {
    let items = visible_media(state);
    if items.is_empty() {
        let message = empty_browse_message(state);
        let placeholder = Paragraph::new(message)
            .style(dim_text())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(panel_block("Titles"));
        frame.render_widget(placeholder, area);
        return;
    }

    let rows: Vec<Row> = items
        .iter()
        .map(|media| {
            Row::new(vec![
                Cell::from(truncate(&media.title, 52)),
                Cell::from(media.media_type.as_str().to_string()),
                Cell::from(media.release_year().unwrap_or("-").to_string()),
                Cell::from(
                    media
                        .vote_average
                        .map(|rating| format!("{rating:.1}"))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::from(progress_note(&state.ledger, media)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(48),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Min(18),
        ],
    )
    .header(
        Row::new(vec!["Title", "Type", "Year", "Rating", "Progress"]).style(
            Style::default()
                .fg(Color::Rgb(129, 140, 248))
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block("Titles"))
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(99, 102, 241))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.table_state);
}

fn empty_browse_message(state: &TuiState) -> String {
    if state.search_results.is_some() {
        return format!("No titles matched `{}`.", state.search_query);
    }
    let key = match state.tab {
        Tab::Home => Some(RowKey::Trending),
        Tab::Movies => Some(super::actions::movies_row_key(state.ranking)),
        Tab::Tv => Some(super::actions::tv_row_key(state.ranking)),
        Tab::History => {
            return "No watch history yet.\n\nPlay something and progress shows up here.".to_string();
        }
        Tab::Bookmarks => {
            return "Your list is empty.\n\nPress b on a title to bookmark it.".to_string();
        }
    };
    match key.and_then(|key| state.rows.get(&key)) {
        Some(RowState::Loading) | None => "Loading...".to_string(),
        Some(RowState::Failed(err)) => format!("Catalog unavailable: {err}"),
        Some(RowState::Ready(_)) => "Nothing to show.".to_string(),
    }
}

/// Short resume note for a browse row, from the most recent ledger entry
/// for that title.
fn progress_note(ledger: &HistoryLedger, media: &MediaSummary) -> String {
    let Some(entry) = ledger.latest_for(&media.id, media.media_type) else {
        return "-".to_string();
    };
    let position = match entry.media_type {
        MediaType::Tv => format!("S{}.E{} ", entry.season.unwrap_or(1), entry.episode.unwrap_or(1)),
        MediaType::Movie => String::new(),
    };
    if is_finished(entry) {
        format!("{position}watched")
    } else {
        match progress_ratio(entry) {
            Some(ratio) => format!("{position}{:.0}%", ratio * 100.0),
            None => position.trim_end().to_string(),
        }
    }
}

fn draw_watch(frame: &mut Frame, state: &mut TuiState) {
    let Some(session) = state.machine.session() else {
        let placeholder = Paragraph::new("Nothing playing. Press Esc.")
            .style(dim_text())
            .alignment(Alignment::Center)
            .block(panel_block("Player"));
        frame.render_widget(placeholder, frame.area());
        return;
    };
    let session = session.clone();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(watch_header(state, &session), chunks[0]);

    if session.media.media_type == MediaType::Tv {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
            .split(chunks[1]);
        draw_info_panel(frame, state, &session, body[0]);
        draw_episode_panel(frame, state, &session, body[1]);
    } else {
        draw_info_panel(frame, state, &session, chunks[1]);
    }

    frame.render_widget(event_feed(state), chunks[2]);
    let controls = Paragraph::new(
        "n/p episode   [/] season   ↑/↓ pick   Enter play   b bookmark   r reload   Esc back",
    )
    .style(dim_text())
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[3]);
    frame.render_widget(status_widget(&state.status), chunks[4]);
}

fn watch_header(state: &TuiState, session: &PlaybackSession) -> Paragraph<'static> {
    let mut spans = vec![Span::styled(
        truncate(&session.media.title, 48),
        Style::default()
            .fg(Color::Rgb(230, 235, 242))
            .add_modifier(Modifier::BOLD),
    )];
    if session.media.media_type == MediaType::Tv {
        spans.push(Span::styled(
            format!("  S{}.E{}", session.season, session.episode),
            Style::default().fg(Color::Rgb(129, 140, 248)),
        ));
    }
    if let Some(year) = session.media.release_year() {
        spans.push(Span::styled(
            format!("  {year}"),
            dim_text(),
        ));
    }
    if state.bookmarks.contains(&session.media.id) {
        spans.push(Span::styled(
            "  ★ bookmarked",
            Style::default().fg(Color::Yellow),
        ));
    }
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(panel_block("Now Playing"))
}

fn draw_info_panel(frame: &mut Frame, state: &TuiState, session: &PlaybackSession, area: Rect) {
    let show_gauge = playback_gauge(session).is_some();
    let sections = if show_gauge {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(3)])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5)])
            .split(area)
    };

    let mut lines: Vec<String> = Vec::new();
    let details_key = (session.media.id.clone(), session.media.media_type);
    match state.details.get(&details_key) {
        Some(DetailsState::Ready(details)) => {
            if let Some(tagline) = &details.tagline {
                lines.push(format!("\"{tagline}\""));
                lines.push(String::new());
            }
            if let Some(overview) = &details.summary.overview {
                lines.push(overview.clone());
                lines.push(String::new());
            }
            if !details.genres.is_empty() {
                lines.push(format!("Genres: {}", details.genres.join(", ")));
            }
            if let Some(runtime) = details.runtime_minutes {
                lines.push(format!("Runtime: {}h {}m", runtime / 60, runtime % 60));
            }
            if session.media.media_type == MediaType::Tv {
                let seasons = details.season_numbers.len();
                let episodes = details
                    .number_of_episodes
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "-".to_string());
                lines.push(format!("Seasons: {seasons} · Episodes: {episodes}"));
            }
        }
        Some(DetailsState::Loading) => lines.push("Loading details...".to_string()),
        Some(DetailsState::Failed(err)) => lines.push(format!("Details unavailable: {err}")),
        None => {}
    }
    if let Some(overview) = &session.media.overview
        && !matches!(state.details.get(&details_key), Some(DetailsState::Ready(_)))
    {
        lines.push(String::new());
        lines.push(overview.clone());
    }

    let info = Paragraph::new(lines.join("\n"))
        .style(Style::default().fg(Color::Rgb(230, 235, 242)))
        .wrap(Wrap { trim: true })
        .block(panel_block("About"));
    frame.render_widget(info, sections[0]);

    if let Some((ratio, label)) = playback_gauge(session) {
        let gauge = Gauge::default()
            .block(panel_block("Playback"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(129, 140, 248))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio(ratio);
        frame.render_widget(gauge, sections[1]);
    }
}

/// Live position gauge from the player's last report, when it carried both
/// a position and a duration.
fn playback_gauge(session: &PlaybackSession) -> Option<(f64, String)> {
    let event = session.last_player_state.as_ref()?;
    let current = event.current_time?;
    let duration = event.duration.filter(|&secs| secs > 0.0)?;
    let ratio = (current / duration).clamp(0.0, 1.0);
    Some((
        ratio,
        format!(
            "{} / {}",
            format_clock(current.floor() as u64),
            format_clock(duration.floor() as u64)
        ),
    ))
}

fn draw_episode_panel(frame: &mut Frame, state: &TuiState, session: &PlaybackSession, area: Rect) {
    let key = (session.media.id.clone(), session.season);
    let list_state = state.episode_lists.get(&key);

    let title = match list_state {
        Some(EpisodeListState::Loading) | None => format!("Season {} (loading...)", session.season),
        Some(EpisodeListState::Ready { warning: Some(_), .. }) => {
            format!("Season {} (unavailable)", session.season)
        }
        Some(EpisodeListState::Ready { .. }) => format!("Season {}", session.season),
    };

    let episodes = list_state.and_then(EpisodeListState::episodes).unwrap_or(&[]);
    if episodes.is_empty() {
        let message = match list_state {
            Some(EpisodeListState::Ready { warning: Some(warning), .. }) => {
                format!("Episode list unavailable:\n{warning}")
            }
            Some(EpisodeListState::Ready { .. }) => "No episodes listed for this season.".to_string(),
            _ => "Loading episodes...".to_string(),
        };
        let placeholder = Paragraph::new(message)
            .style(dim_text())
            .wrap(Wrap { trim: true })
            .block(panel_block_owned(title));
        frame.render_widget(placeholder, area);
        return;
    }

    let rows: Vec<Row> = episodes
        .iter()
        .map(|episode| {
            let marker = if episode.number == session.episode {
                "▸"
            } else {
                " "
            };
            Row::new(vec![
                Cell::from(format!("{marker} {:>3}", episode.number)),
                Cell::from(truncate(&episode.name, 34)),
            ])
        })
        .collect();

    let mut cursor = TableState::default();
    cursor.select(Some(state.episode_cursor.min(episodes.len() - 1)));

    let table = Table::new(rows, [Constraint::Length(6), Constraint::Min(20)])
        .block(panel_block_owned(title))
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(99, 102, 241))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(table, area, &mut cursor);
}

fn event_feed(state: &TuiState) -> Paragraph<'static> {
    if state.recent_events.is_empty() {
        return Paragraph::new("No player events yet.")
            .style(dim_text())
            .block(panel_block("Player Events"));
    }
    let lines: Vec<Line> = state
        .recent_events
        .iter()
        .map(|(time, event)| Line::from(format_event_line(time, event)))
        .collect();
    Paragraph::new(lines)
        .style(Style::default().fg(Color::Rgb(185, 195, 210)))
        .block(panel_block("Player Events"))
}

fn format_event_line(time: &str, event: &PlaybackEvent) -> String {
    let mut line = format!("{time}  {:<12}", event.kind);
    if let Some(current) = event.current_time {
        line.push_str(&format!(" t={current:.0}s"));
    }
    if let Some(duration) = event.duration {
        line.push_str(&format!(" d={duration:.0}s"));
    }
    if let (Some(season), Some(episode)) = (event.season, event.episode) {
        line.push_str(&format!(" S{season}.E{episode}"));
    }
    line
}

fn status_widget(status: &str) -> Paragraph<'static> {
    Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"))
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn panel_block_owned(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn pill_style(active: bool) -> Style {
    if active {
        Style::default()
            .bg(Color::Rgb(99, 102, 241))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .bg(Color::Rgb(52, 58, 70))
            .fg(Color::Rgb(230, 235, 242))
    }
}

fn dim_text() -> Style {
    Style::default().fg(Color::Rgb(148, 158, 172))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}
