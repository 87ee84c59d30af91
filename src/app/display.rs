use chrono::{DateTime, Local};

use super::playback::{HistoryEntry, MediaType, progress_ratio};

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_updated_display(updated_at_ms: i64) -> String {
    DateTime::from_timestamp_millis(updated_at_ms)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// "12:34 / 41:10 (30%)", falling back to the bare position when the
/// duration is unknown.
pub(crate) fn format_progress_text(entry: &HistoryEntry) -> String {
    let position = format_clock(entry.progress_seconds.max(0.0).floor() as u64);
    match progress_ratio(entry) {
        Some(ratio) => format!(
            "{position} / {} ({:.0}%)",
            format_clock(entry.duration_seconds.max(0.0).floor() as u64),
            ratio * 100.0
        ),
        None => position,
    }
}

/// "S2.E5" for TV entries, "-" for movies.
pub(crate) fn format_position_display(entry: &HistoryEntry) -> String {
    match entry.media_type {
        MediaType::Tv => format!(
            "S{}.E{}",
            entry.season.unwrap_or(1),
            entry.episode.unwrap_or(1)
        ),
        MediaType::Movie => "-".to_string(),
    }
}
