use anyhow::{Context, Result};
use serde_json::{Value, json};

use super::{Bookmark, HistoryEntry, MediaSummary, MediaType};
use crate::store::Store;

pub(crate) const HISTORY_CAP: usize = 50;
pub(crate) const HISTORY_KEY: &str = "watch_history";
pub(crate) const BOOKMARKS_KEY: &str = "bookmarks";

/// Bounded, deduplicated watch history, newest first. Merging is pure on
/// the in-memory list; writing it back to the store is an explicit step
/// (`save_history`).
#[derive(Debug, Default)]
pub(crate) struct HistoryLedger {
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Drop every entry with `entry`'s identity key, prepend `entry`, cap at
    /// 50. The newest write is always at index 0.
    pub(crate) fn merge(&mut self, entry: HistoryEntry) -> &[HistoryEntry] {
        self.entries.retain(|existing| !existing.same_identity(&entry));
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAP);
        &self.entries
    }

    /// Exact identity-key lookup, season/episode included for TV.
    pub(crate) fn find(
        &self,
        id: &str,
        media_type: MediaType,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| {
            entry.id == id
                && entry.media_type == media_type
                && match media_type {
                    MediaType::Movie => true,
                    MediaType::Tv => entry.season == season && entry.episode == episode,
                }
        })
    }

    /// Most recent entry for a title regardless of season/episode; used to
    /// seed the session position when a show is reopened.
    pub(crate) fn latest_for(&self, id: &str, media_type: MediaType) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id == id && entry.media_type == media_type)
    }
}

#[derive(Debug, Default)]
pub(crate) struct HistoryRead {
    pub(crate) ledger: HistoryLedger,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn load_history(store: &Store) -> Result<HistoryRead> {
    let Some(raw) = store.get(HISTORY_KEY)? else {
        return Ok(HistoryRead::default());
    };
    let (entries, skipped) = parse_history_entries(&raw);
    let mut warnings = Vec::new();
    if skipped > 0 {
        warnings.push(format!(
            "ignored {skipped} malformed watch-history record(s)"
        ));
    }
    Ok(HistoryRead {
        ledger: HistoryLedger::from_entries(entries),
        warnings,
    })
}

pub(crate) fn save_history(store: &Store, ledger: &HistoryLedger) -> Result<()> {
    let items: Vec<Value> = ledger.entries().iter().map(history_entry_to_value).collect();
    store
        .set(HISTORY_KEY, &Value::Array(items).to_string())
        .context("failed to persist watch history")
}

pub(crate) fn parse_history_entries(raw: &str) -> (Vec<HistoryEntry>, usize) {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return (Vec::new(), 1);
    };
    let Some(items) = value.as_array() else {
        return (Vec::new(), 1);
    };

    let mut entries = Vec::new();
    let mut skipped = 0;
    for item in items {
        match parse_history_entry(item) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    entries.truncate(HISTORY_CAP);
    (entries, skipped)
}

fn parse_history_entry(item: &Value) -> Option<HistoryEntry> {
    let id = non_empty_str(item.get("id"))?;
    let media_type = MediaType::parse(item.get("media_type")?.as_str()?)?;
    let title = non_empty_str(item.get("title"))?;
    let (season, episode) = match media_type {
        MediaType::Tv => (
            item.get("season").and_then(Value::as_u64).map(|s| s as u32),
            item.get("episode").and_then(Value::as_u64).map(|e| e as u32),
        ),
        MediaType::Movie => (None, None),
    };
    Some(HistoryEntry {
        id,
        media_type,
        title,
        poster_path: item.get("poster").and_then(Value::as_str).map(str::to_string),
        season,
        episode,
        progress_seconds: item
            .get("progress")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .max(0.0),
        duration_seconds: item
            .get("duration")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .max(0.0),
        updated_at_ms: item.get("updated_at").and_then(Value::as_i64).unwrap_or(0),
    })
}

fn history_entry_to_value(entry: &HistoryEntry) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert("id".to_string(), json!(entry.id));
    fields.insert("media_type".to_string(), json!(entry.media_type.as_str()));
    fields.insert("title".to_string(), json!(entry.title));
    fields.insert("progress".to_string(), json!(entry.progress_seconds));
    fields.insert("duration".to_string(), json!(entry.duration_seconds));
    fields.insert("updated_at".to_string(), json!(entry.updated_at_ms));
    if let Some(poster) = &entry.poster_path {
        fields.insert("poster".to_string(), json!(poster));
    }
    if let Some(season) = entry.season {
        fields.insert("season".to_string(), json!(season));
    }
    if let Some(episode) = entry.episode {
        fields.insert("episode".to_string(), json!(episode));
    }
    Value::Object(fields)
}

/// Bookmarked titles, toggled on/off, newest insertion first.
#[derive(Debug, Default)]
pub(crate) struct BookmarkList {
    items: Vec<Bookmark>,
}

impl BookmarkList {
    pub(crate) fn from_items(items: Vec<Bookmark>) -> Self {
        Self { items }
    }

    pub(crate) fn items(&self) -> &[Bookmark] {
        &self.items
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|bookmark| bookmark.id == id)
    }

    /// Returns true when the title was added, false when removed.
    pub(crate) fn toggle(&mut self, media: &MediaSummary) -> bool {
        if self.contains(&media.id) {
            self.items.retain(|bookmark| bookmark.id != media.id);
            return false;
        }
        self.items.insert(
            0,
            Bookmark {
                id: media.id.clone(),
                media_type: media.media_type,
                title: media.title.clone(),
                poster_path: media.poster_path.clone(),
            },
        );
        true
    }
}

#[derive(Debug, Default)]
pub(crate) struct BookmarksRead {
    pub(crate) bookmarks: BookmarkList,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn load_bookmarks(store: &Store) -> Result<BookmarksRead> {
    let Some(raw) = store.get(BOOKMARKS_KEY)? else {
        return Ok(BookmarksRead::default());
    };
    let (items, skipped) = parse_bookmark_items(&raw);
    let mut warnings = Vec::new();
    if skipped > 0 {
        warnings.push(format!("ignored {skipped} malformed bookmark record(s)"));
    }
    Ok(BookmarksRead {
        bookmarks: BookmarkList::from_items(items),
        warnings,
    })
}

pub(crate) fn save_bookmarks(store: &Store, bookmarks: &BookmarkList) -> Result<()> {
    let items: Vec<Value> = bookmarks.items().iter().map(bookmark_to_value).collect();
    store
        .set(BOOKMARKS_KEY, &Value::Array(items).to_string())
        .context("failed to persist bookmarks")
}

pub(crate) fn parse_bookmark_items(raw: &str) -> (Vec<Bookmark>, usize) {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return (Vec::new(), 1);
    };
    let Some(items) = value.as_array() else {
        return (Vec::new(), 1);
    };

    let mut bookmarks = Vec::new();
    let mut skipped = 0;
    for item in items {
        match parse_bookmark(item) {
            Some(bookmark) => bookmarks.push(bookmark),
            None => skipped += 1,
        }
    }
    (bookmarks, skipped)
}

fn parse_bookmark(item: &Value) -> Option<Bookmark> {
    Some(Bookmark {
        id: non_empty_str(item.get("id"))?,
        media_type: MediaType::parse(item.get("media_type")?.as_str()?)?,
        title: non_empty_str(item.get("title"))?,
        poster_path: item.get("poster").and_then(Value::as_str).map(str::to_string),
    })
}

fn bookmark_to_value(bookmark: &Bookmark) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert("id".to_string(), json!(bookmark.id));
    fields.insert("media_type".to_string(), json!(bookmark.media_type.as_str()));
    fields.insert("title".to_string(), json!(bookmark.title));
    if let Some(poster) = &bookmark.poster_path {
        fields.insert("poster".to_string(), json!(poster));
    }
    Value::Object(fields)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}
