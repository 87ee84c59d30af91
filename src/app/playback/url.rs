use super::MediaType;

pub(crate) const PLAYER_HOST: &str = "https://www.vidking.net";
pub(crate) const PLAYER_ACCENT_COLOR: &str = "6366f1";

/// Build the embed URL the player is handed. Pure; everything the URL
/// depends on arrives as an argument. The path and parameter shapes are an
/// external compatibility contract with the player. `season`/`episode` are
/// ignored for movies; `progress` is only attached when there is a position
/// to resume from.
pub(crate) fn build_embed_url(
    media_id: &str,
    media_type: MediaType,
    season: u32,
    episode: u32,
    resume_secs: u64,
) -> String {
    let mut url = match media_type {
        MediaType::Tv => format!(
            "{PLAYER_HOST}/embed/tv/{media_id}/{season}/{episode}?episodeSelector=true&nextEpisode=true&color={PLAYER_ACCENT_COLOR}"
        ),
        MediaType::Movie => {
            format!("{PLAYER_HOST}/embed/movie/{media_id}?color={PLAYER_ACCENT_COLOR}")
        }
    };
    if resume_secs > 0 {
        url.push_str(&format!("&progress={resume_secs}"));
    }
    url
}
