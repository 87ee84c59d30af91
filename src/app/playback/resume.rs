use super::{HistoryEntry, HistoryLedger, MediaType};

/// At or past this share of the duration a title counts as finished;
/// consumers restart instead of resuming.
pub(crate) const FINISHED_RATIO: f64 = 0.95;

/// Last known progress for an identity key, floored to whole seconds.
/// Unknown titles start at 0.
pub(crate) fn resolve_resume(
    ledger: &HistoryLedger,
    id: &str,
    media_type: MediaType,
    season: Option<u32>,
    episode: Option<u32>,
) -> u64 {
    ledger
        .find(id, media_type, season, episode)
        .map(|entry| entry.progress_seconds.max(0.0).floor() as u64)
        .unwrap_or(0)
}

pub(crate) fn progress_ratio(entry: &HistoryEntry) -> Option<f64> {
    (entry.duration_seconds > 0.0)
        .then(|| (entry.progress_seconds / entry.duration_seconds).clamp(0.0, 1.0))
}

pub(crate) fn is_finished(entry: &HistoryEntry) -> bool {
    progress_ratio(entry).is_some_and(|ratio| ratio >= FINISHED_RATIO)
}

/// The resume position a player launch should use: the resolved progress,
/// unless the entry is finished, in which case playback restarts.
pub(crate) fn resume_position(
    ledger: &HistoryLedger,
    id: &str,
    media_type: MediaType,
    season: Option<u32>,
    episode: Option<u32>,
) -> u64 {
    if ledger
        .find(id, media_type, season, episode)
        .is_some_and(is_finished)
    {
        return 0;
    }
    resolve_resume(ledger, id, media_type, season, episode)
}
