use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;

use super::playback::{MediaSummary, MediaType};
use crate::http::get_json_with_retries;

pub(crate) const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub(crate) const CACHE_TTL: Duration = Duration::from_secs(15 * 60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);
const READ_TIMEOUT: Duration = Duration::from_secs(8);
const FETCH_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub(crate) struct EpisodeInfo {
    pub(crate) number: u32,
    pub(crate) name: String,
    pub(crate) overview: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct MediaDetails {
    pub(crate) summary: MediaSummary,
    pub(crate) tagline: Option<String>,
    pub(crate) genres: Vec<String>,
    pub(crate) runtime_minutes: Option<u32>,
    pub(crate) season_numbers: Vec<u32>,
    pub(crate) number_of_episodes: Option<u32>,
    pub(crate) similar: Vec<MediaSummary>,
}

struct CachedResponse {
    fetched_at: Instant,
    value: Value,
}

/// TMDB client with a TTL response cache in front of every request. Safe to
/// share across the TUI's fetch threads; the cache is the only shared state.
pub(crate) struct CatalogClient {
    base_url: String,
    api_key: String,
    cache: Mutex<HashMap<String, CachedResponse>>,
}

impl CatalogClient {
    pub(crate) fn new(base_url: &str, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY is not set")?;
        Ok(Self::new(TMDB_BASE_URL, api_key))
    }

    pub(crate) fn search(&self, query: &str) -> Result<Vec<MediaSummary>> {
        let value = self.fetch(
            "/search/multi",
            &[
                ("query".to_string(), query.to_string()),
                ("include_adult".to_string(), "false".to_string()),
            ],
        )?;
        Ok(parse_media_results(&value, None))
    }

    pub(crate) fn trending(&self) -> Result<Vec<MediaSummary>> {
        let value = self.fetch("/trending/all/week", &[])?;
        Ok(parse_media_results(&value, None))
    }

    pub(crate) fn popular_movies(&self) -> Result<Vec<MediaSummary>> {
        let value = self.fetch("/movie/popular", &[])?;
        Ok(parse_media_results(&value, Some(MediaType::Movie)))
    }

    pub(crate) fn popular_tv(&self) -> Result<Vec<MediaSummary>> {
        let value = self.fetch("/tv/popular", &[])?;
        Ok(parse_media_results(&value, Some(MediaType::Tv)))
    }

    pub(crate) fn top_rated_movies(&self) -> Result<Vec<MediaSummary>> {
        let value = self.fetch("/movie/top_rated", &[])?;
        Ok(parse_media_results(&value, Some(MediaType::Movie)))
    }

    pub(crate) fn top_rated_tv(&self) -> Result<Vec<MediaSummary>> {
        let value = self.fetch("/tv/top_rated", &[])?;
        Ok(parse_media_results(&value, Some(MediaType::Tv)))
    }

    pub(crate) fn details(&self, media_id: &str, media_type: MediaType) -> Result<MediaDetails> {
        let path = format!("/{}/{media_id}", media_type.as_str());
        let value = self.fetch(
            &path,
            &[(
                "append_to_response".to_string(),
                "credits,similar".to_string(),
            )],
        )?;
        parse_media_details(&value, media_id, media_type)
            .with_context(|| format!("catalog returned an unusable record for {path}"))
    }

    /// Episode list for one season. Callers degrade a failure to an empty
    /// list; the player runs fine without episode metadata.
    pub(crate) fn episodes(&self, media_id: &str, season: u32) -> Result<Vec<EpisodeInfo>> {
        let value = self.fetch(&format!("/tv/{media_id}/season/{season}"), &[])?;
        Ok(parse_episode_list(&value))
    }

    fn fetch(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let cache_key = cache_key_for(path, query);
        if let Some(value) = self.cached(&cache_key) {
            return Ok(value);
        }

        let url = format!("{}{path}", self.base_url);
        let mut full_query = query.to_vec();
        full_query.push(("api_key".to_string(), self.api_key.clone()));
        let value = get_json_with_retries(
            &url,
            &full_query,
            CONNECT_TIMEOUT,
            READ_TIMEOUT,
            FETCH_ATTEMPTS,
            RETRY_DELAY,
        )
        .with_context(|| format!("catalog request {path} failed"))?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                cache_key,
                CachedResponse {
                    fetched_at: Instant::now(),
                    value: value.clone(),
                },
            );
        }
        Ok(value)
    }

    fn cached(&self, key: &str) -> Option<Value> {
        let mut cache = self.cache.lock().ok()?;
        match cache.get(key) {
            Some(cached) if cached.fetched_at.elapsed() < CACHE_TTL => Some(cached.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn seed_cache_at(&self, path: &str, query: &[(String, String)], fetched_at: Instant, value: Value) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(cache_key_for(path, query), CachedResponse { fetched_at, value });
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_for_test(&self, path: &str, query: &[(String, String)]) -> Option<Value> {
        self.cached(&cache_key_for(path, query))
    }
}

fn cache_key_for(path: &str, query: &[(String, String)]) -> String {
    let mut key = path.to_string();
    for (name, value) in query {
        key.push_str(&format!("&{name}={value}"));
    }
    key
}

pub(crate) fn parse_media_results(value: &Value, fallback: Option<MediaType>) -> Vec<MediaSummary> {
    let Some(results) = value.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    results
        .iter()
        .filter_map(|item| parse_media_summary(item, fallback))
        .collect()
}

pub(crate) fn parse_media_summary(item: &Value, fallback: Option<MediaType>) -> Option<MediaSummary> {
    let id = item.get("id").and_then(Value::as_u64)?.to_string();
    let title = ["title", "name"]
        .iter()
        .find_map(|field| item.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|title| !title.is_empty())?
        .to_string();

    // Multi-search mixes in people; only movies and shows are playable.
    let media_type = match item.get("media_type").and_then(Value::as_str) {
        Some(raw) => MediaType::parse(raw)?,
        None if item.get("first_air_date").is_some() => MediaType::Tv,
        None => fallback.unwrap_or(MediaType::Movie),
    };

    Some(MediaSummary {
        id,
        media_type,
        title,
        poster_path: item
            .get("poster_path")
            .and_then(Value::as_str)
            .map(str::to_string),
        vote_average: item.get("vote_average").and_then(Value::as_f64),
        release_date: ["release_date", "first_air_date"]
            .iter()
            .find_map(|field| item.get(*field).and_then(Value::as_str))
            .filter(|date| !date.is_empty())
            .map(str::to_string),
        overview: item
            .get("overview")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
    })
}

pub(crate) fn parse_media_details(
    value: &Value,
    media_id: &str,
    media_type: MediaType,
) -> Option<MediaDetails> {
    let mut summary = parse_media_summary(value, Some(media_type))?;
    // Detail payloads omit media_type; trust the requested one.
    summary.media_type = media_type;
    summary.id = media_id.to_string();

    let genres = value
        .get("genres")
        .and_then(Value::as_array)
        .map(|genres| {
            genres
                .iter()
                .filter_map(|genre| genre.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // Season 0 holds specials; the selector skips it, as the catalog UI does.
    let season_numbers = value
        .get("seasons")
        .and_then(Value::as_array)
        .map(|seasons| {
            seasons
                .iter()
                .filter_map(|season| season.get("season_number").and_then(Value::as_u64))
                .filter(|number| *number > 0)
                .map(|number| number as u32)
                .collect()
        })
        .unwrap_or_default();

    Some(MediaDetails {
        summary,
        tagline: value
            .get("tagline")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        genres,
        runtime_minutes: value
            .get("runtime")
            .and_then(Value::as_u64)
            .map(|minutes| minutes as u32),
        season_numbers,
        number_of_episodes: value
            .get("number_of_episodes")
            .and_then(Value::as_u64)
            .map(|count| count as u32),
        similar: value
            .pointer("/similar/results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter_map(|item| parse_media_summary(item, Some(media_type)))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

pub(crate) fn parse_episode_list(value: &Value) -> Vec<EpisodeInfo> {
    let Some(episodes) = value.get("episodes").and_then(Value::as_array) else {
        return Vec::new();
    };
    episodes
        .iter()
        .filter_map(|episode| {
            let number = episode.get("episode_number").and_then(Value::as_u64)?;
            if number == 0 {
                return None;
            }
            Some(EpisodeInfo {
                number: number as u32,
                name: episode
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or("Untitled")
                    .to_string(),
                overview: episode
                    .get("overview")
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}
