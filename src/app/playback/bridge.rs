use serde_json::Value;

use super::PlaybackEvent;

const ENVELOPE_TAG: &str = "PLAYER_EVENT";

/// Decode one raw payload from the player channel. The channel is shared and
/// untrusted: the player process may interleave its own logging with event
/// lines, so anything that is not a well-formed `PLAYER_EVENT` envelope is
/// answered with `None` and nothing else. This function must never panic.
pub(crate) fn decode_player_message(raw: &str) -> Option<PlaybackEvent> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    if value.get("type")?.as_str()? != ENVELOPE_TAG {
        return None;
    }
    let data = value.get("data")?.as_object()?;
    let kind = data.get("event")?.as_str()?.trim();
    if kind.is_empty() {
        return None;
    }

    Some(PlaybackEvent {
        kind: kind.to_string(),
        season: positive_int(data.get("season")),
        episode: positive_int(data.get("episode")),
        current_time: non_negative_seconds(data.get("currentTime")),
        duration: non_negative_seconds(data.get("duration")),
    })
}

// Season/episode numbers are 1-based; zero, negatives, and fractions are
// treated as absent rather than rejecting the whole event.
fn positive_int(value: Option<&Value>) -> Option<u32> {
    let number = value?.as_u64()?;
    if number == 0 || number > u64::from(u32::MAX) {
        return None;
    }
    Some(number as u32)
}

fn non_negative_seconds(value: Option<&Value>) -> Option<f64> {
    let seconds = value?.as_f64()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}
