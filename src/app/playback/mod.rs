mod bridge;
mod ledger;
mod machine;
mod resume;
mod url;

pub(crate) use bridge::decode_player_message;
pub(crate) use ledger::{
    BookmarkList, HistoryLedger, load_bookmarks, load_history, save_bookmarks, save_history,
};
pub(crate) use machine::{EpisodeFetch, PlaybackSession, PlaybackStateMachine};
pub(crate) use resume::{is_finished, progress_ratio, resolve_resume, resume_position};
pub(crate) use url::build_embed_url;

#[cfg(test)]
pub(crate) use ledger::{HISTORY_CAP, parse_bookmark_items, parse_history_entries};
#[cfg(test)]
pub(crate) use machine::{SelectOutcome, should_record_history};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            _ => None,
        }
    }
}

/// Catalog identity of one title, enough to start playback and to stamp
/// ledger entries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaSummary {
    pub(crate) id: String,
    pub(crate) media_type: MediaType,
    pub(crate) title: String,
    pub(crate) poster_path: Option<String>,
    pub(crate) vote_average: Option<f64>,
    pub(crate) release_date: Option<String>,
    pub(crate) overview: Option<String>,
}

impl MediaSummary {
    pub(crate) fn release_year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .filter(|year| !year.is_empty())
    }
}

/// One decoded notification from the player channel. Ephemeral; never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaybackEvent {
    pub(crate) kind: String,
    pub(crate) season: Option<u32>,
    pub(crate) episode: Option<u32>,
    pub(crate) current_time: Option<f64>,
    pub(crate) duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistoryEntry {
    pub(crate) id: String,
    pub(crate) media_type: MediaType,
    pub(crate) title: String,
    pub(crate) poster_path: Option<String>,
    pub(crate) season: Option<u32>,
    pub(crate) episode: Option<u32>,
    pub(crate) progress_seconds: f64,
    pub(crate) duration_seconds: f64,
    pub(crate) updated_at_ms: i64,
}

impl HistoryEntry {
    /// Identity key equality: `(id, type)` for movies, `(id, type, season,
    /// episode)` for TV. The ledger holds at most one entry per key.
    pub(crate) fn same_identity(&self, other: &Self) -> bool {
        if self.id != other.id || self.media_type != other.media_type {
            return false;
        }
        match self.media_type {
            MediaType::Movie => true,
            MediaType::Tv => self.season == other.season && self.episode == other.episode,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Bookmark {
    pub(crate) id: String,
    pub(crate) media_type: MediaType,
    pub(crate) title: String,
    pub(crate) poster_path: Option<String>,
}
