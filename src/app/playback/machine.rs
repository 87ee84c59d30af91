use chrono::Utc;

use super::{HistoryEntry, MediaSummary, MediaType, PlaybackEvent};

pub(crate) const TIMEUPDATE_INTERVAL_SECS: f64 = 30.0;
pub(crate) const TIMEUPDATE_WINDOW_SECS: f64 = 2.0;

/// What is currently playing. Replaced wholesale when the user selects a
/// different title; mutated only through the state machine's transitions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaybackSession {
    pub(crate) media: MediaSummary,
    pub(crate) season: u32,
    pub(crate) episode: u32,
    pub(crate) last_player_state: Option<PlaybackEvent>,
    pub(crate) reload_token: u64,
}

/// An episode-list fetch the caller should issue, tagged with the identity
/// it was requested for so a late result cannot attach to a different
/// season or title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeFetch {
    pub(crate) media_id: String,
    pub(crate) season: u32,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct SelectOutcome {
    pub(crate) fetch: Option<EpisodeFetch>,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct EventOutcome {
    /// False when the machine was idle and dropped the event.
    pub(crate) accepted: bool,
    /// The player navigated itself to a different season/episode.
    pub(crate) navigated: bool,
    pub(crate) history: Option<HistoryEntry>,
    pub(crate) fetch: Option<EpisodeFetch>,
}

/// Reconciles the host's navigation commands with the player's own event
/// stream. App-initiated transitions bump the reload token (the player must
/// reinitialize from a fresh URL); player-initiated ones never do — the
/// player already navigated itself, and reloading it would throw that away
/// and re-trigger the same event.
#[derive(Debug, Default)]
pub(crate) struct PlaybackStateMachine {
    session: Option<PlaybackSession>,
    reload_counter: u64,
}

impl PlaybackStateMachine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    /// App-initiated: start playing a title. The token counter outlives the
    /// session so that consecutive selections always present a new token.
    pub(crate) fn select_media(
        &mut self,
        media: MediaSummary,
        season: u32,
        episode: u32,
    ) -> SelectOutcome {
        self.reload_counter += 1;
        let fetch = (media.media_type == MediaType::Tv).then(|| EpisodeFetch {
            media_id: media.id.clone(),
            season,
        });
        self.session = Some(PlaybackSession {
            media,
            season,
            episode,
            last_player_state: None,
            reload_token: self.reload_counter,
        });
        SelectOutcome { fetch }
    }

    /// App-initiated: jump to another season. Resets the episode to 1.
    pub(crate) fn select_season(&mut self, season: u32) -> SelectOutcome {
        let Some(session) = self.session.as_mut() else {
            return SelectOutcome::default();
        };
        if session.media.media_type != MediaType::Tv {
            return SelectOutcome::default();
        }
        session.season = season;
        session.episode = 1;
        self.reload_counter += 1;
        session.reload_token = self.reload_counter;
        SelectOutcome {
            fetch: Some(EpisodeFetch {
                media_id: session.media.id.clone(),
                season,
            }),
        }
    }

    /// App-initiated: jump to another episode within the current season.
    pub(crate) fn select_episode(&mut self, episode: u32) -> SelectOutcome {
        let Some(session) = self.session.as_mut() else {
            return SelectOutcome::default();
        };
        if session.media.media_type != MediaType::Tv {
            return SelectOutcome::default();
        }
        session.episode = episode;
        self.reload_counter += 1;
        session.reload_token = self.reload_counter;
        SelectOutcome::default()
    }

    pub(crate) fn clear(&mut self) {
        self.session = None;
    }

    /// Player-initiated path. Idle machines ignore stray events entirely;
    /// the channel may keep delivering after teardown.
    pub(crate) fn on_player_event(&mut self, event: PlaybackEvent) -> EventOutcome {
        let Some(session) = self.session.as_mut() else {
            return EventOutcome::default();
        };

        let mut outcome = EventOutcome {
            accepted: true,
            ..EventOutcome::default()
        };

        if session.media.media_type == MediaType::Tv {
            let season_changed = event.season.is_some_and(|season| season != session.season);
            let episode_changed = event
                .episode
                .is_some_and(|episode| episode != session.episode);
            if season_changed || episode_changed {
                // Adopt the player's position without touching the reload
                // token; a reload here would loop the transition forever.
                if let Some(season) = event.season {
                    session.season = season;
                }
                if let Some(episode) = event.episode {
                    session.episode = episode;
                }
                outcome.navigated = true;
                if season_changed {
                    outcome.fetch = Some(EpisodeFetch {
                        media_id: session.media.id.clone(),
                        season: session.season,
                    });
                }
            }
        }

        if should_record_history(&event) {
            outcome.history = Some(history_entry_for(session, &event));
        }
        session.last_player_state = Some(event);
        outcome
    }
}

/// `timeupdate` events fire at frame rate; only those within a 2-second
/// window of each 30-second boundary are written. `pause` and `ended`
/// always are.
pub(crate) fn should_record_history(event: &PlaybackEvent) -> bool {
    match event.kind.as_str() {
        "pause" | "ended" => true,
        "timeupdate" => event
            .current_time
            .is_some_and(|secs| secs % TIMEUPDATE_INTERVAL_SECS < TIMEUPDATE_WINDOW_SECS),
        _ => false,
    }
}

fn history_entry_for(session: &PlaybackSession, event: &PlaybackEvent) -> HistoryEntry {
    let (season, episode) = match session.media.media_type {
        MediaType::Tv => (
            Some(event.season.unwrap_or(session.season)),
            Some(event.episode.unwrap_or(session.episode)),
        ),
        MediaType::Movie => (None, None),
    };
    HistoryEntry {
        id: session.media.id.clone(),
        media_type: session.media.media_type,
        title: session.media.title.clone(),
        poster_path: session.media.poster_path.clone(),
        season,
        episode,
        progress_seconds: event.current_time.unwrap_or(0.0),
        duration_seconds: event.duration.unwrap_or(0.0),
        updated_at_ms: Utc::now().timestamp_millis(),
    }
}
