use std::time::{Duration, Instant};

use serde_json::json;

use super::catalog::{
    CACHE_TTL, CatalogClient, parse_episode_list, parse_media_details, parse_media_results,
    parse_media_summary,
};
use super::playback::*;

fn movie(id: &str, title: &str) -> MediaSummary {
    MediaSummary {
        id: id.to_string(),
        media_type: MediaType::Movie,
        title: title.to_string(),
        poster_path: None,
        vote_average: None,
        release_date: None,
        overview: None,
    }
}

fn show(id: &str, title: &str) -> MediaSummary {
    MediaSummary {
        id: id.to_string(),
        media_type: MediaType::Tv,
        ..movie(id, title)
    }
}

fn movie_entry(id: &str, progress: f64, duration: f64) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        media_type: MediaType::Movie,
        title: format!("Movie {id}"),
        poster_path: None,
        season: None,
        episode: None,
        progress_seconds: progress,
        duration_seconds: duration,
        updated_at_ms: 1_700_000_000_000,
    }
}

fn tv_entry(id: &str, season: u32, episode: u32, progress: f64) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        media_type: MediaType::Tv,
        title: format!("Show {id}"),
        poster_path: None,
        season: Some(season),
        episode: Some(episode),
        progress_seconds: progress,
        duration_seconds: 2400.0,
        updated_at_ms: 1_700_000_000_000,
    }
}

fn event(kind: &str) -> PlaybackEvent {
    PlaybackEvent {
        kind: kind.to_string(),
        season: None,
        episode: None,
        current_time: None,
        duration: None,
    }
}

fn timeupdate(secs: f64) -> PlaybackEvent {
    PlaybackEvent {
        current_time: Some(secs),
        duration: Some(2400.0),
        ..event("timeupdate")
    }
}

// ---- MessageBridge ----

#[test]
fn decode_accepts_full_player_event_envelope() {
    let raw = r#"{"type":"PLAYER_EVENT","data":{"event":"timeupdate","season":2,"episode":5,"currentTime":61.5,"duration":2400}}"#;
    let event = decode_player_message(raw).expect("envelope should decode");
    assert_eq!(event.kind, "timeupdate");
    assert_eq!(event.season, Some(2));
    assert_eq!(event.episode, Some(5));
    assert_eq!(event.current_time, Some(61.5));
    assert_eq!(event.duration, Some(2400.0));
}

#[test]
fn decode_rejects_payloads_that_are_not_json() {
    assert!(decode_player_message("not json at all").is_none());
    assert!(decode_player_message("").is_none());
    assert!(decode_player_message("mpv: opening stream...").is_none());
}

#[test]
fn decode_rejects_foreign_envelope_tags() {
    let raw = r#"{"type":"ANALYTICS","data":{"event":"play"}}"#;
    assert!(decode_player_message(raw).is_none());
}

#[test]
fn decode_rejects_envelope_without_data_object() {
    assert!(decode_player_message(r#"{"type":"PLAYER_EVENT"}"#).is_none());
    assert!(decode_player_message(r#"{"type":"PLAYER_EVENT","data":"play"}"#).is_none());
}

#[test]
fn decode_rejects_data_without_event_kind() {
    let raw = r#"{"type":"PLAYER_EVENT","data":{"currentTime":12}}"#;
    assert!(decode_player_message(raw).is_none());
    let blank = r#"{"type":"PLAYER_EVENT","data":{"event":"  "}}"#;
    assert!(decode_player_message(blank).is_none());
}

#[test]
fn decode_treats_nonpositive_season_and_episode_as_absent() {
    let raw = r#"{"type":"PLAYER_EVENT","data":{"event":"play","season":0,"episode":-3}}"#;
    let event = decode_player_message(raw).expect("event should still decode");
    assert_eq!(event.season, None);
    assert_eq!(event.episode, None);
}

#[test]
fn decode_treats_unusable_times_as_absent() {
    let raw = r#"{"type":"PLAYER_EVENT","data":{"event":"pause","currentTime":"abc","duration":-5}}"#;
    let event = decode_player_message(raw).expect("event should still decode");
    assert_eq!(event.current_time, None);
    assert_eq!(event.duration, None);
}

#[test]
fn decode_handles_arbitrary_junk_without_panicking() {
    for raw in ["null", "[1,2,3]", "{}", "42", r#"{"type":7}"#, "\u{0}\u{1}"] {
        assert!(decode_player_message(raw).is_none(), "junk decoded: {raw}");
    }
}

// ---- HistoryLedger ----

#[test]
fn merge_puts_newest_write_at_index_zero() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(movie_entry("1", 10.0, 100.0));
    ledger.merge(movie_entry("2", 20.0, 100.0));
    assert_eq!(ledger.entries()[0].id, "2");
    assert_eq!(ledger.entries()[1].id, "1");
}

#[test]
fn merge_replaces_entry_with_same_movie_identity() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(movie_entry("603", 10.0, 100.0));
    ledger.merge(movie_entry("604", 5.0, 100.0));
    ledger.merge(movie_entry("603", 50.0, 100.0));

    assert_eq!(ledger.entries().len(), 2);
    assert_eq!(ledger.entries()[0].id, "603");
    assert_eq!(ledger.entries()[0].progress_seconds, 50.0);
}

#[test]
fn merge_keeps_distinct_tv_episodes_and_replaces_same_one() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(tv_entry("100", 1, 1, 100.0));
    ledger.merge(tv_entry("100", 1, 2, 100.0));
    assert_eq!(ledger.entries().len(), 2);

    ledger.merge(tv_entry("100", 1, 1, 900.0));
    assert_eq!(ledger.entries().len(), 2);
    assert_eq!(ledger.entries()[0].episode, Some(1));
    assert_eq!(ledger.entries()[0].progress_seconds, 900.0);
}

#[test]
fn merge_never_exceeds_the_cap_and_evicts_oldest() {
    let mut ledger = HistoryLedger::new();
    for i in 0..(HISTORY_CAP + 5) {
        ledger.merge(movie_entry(&i.to_string(), 1.0, 100.0));
    }
    assert_eq!(ledger.entries().len(), HISTORY_CAP);
    assert_eq!(ledger.entries()[0].id, (HISTORY_CAP + 4).to_string());
    assert!(!ledger.entries().iter().any(|entry| entry.id == "0"));
}

#[test]
fn merge_is_idempotent_for_an_identical_entry() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(movie_entry("other", 3.0, 100.0));
    ledger.merge(tv_entry("100", 2, 4, 66.0));
    let first: Vec<HistoryEntry> = ledger.entries().to_vec();

    ledger.merge(tv_entry("100", 2, 4, 66.0));
    assert_eq!(ledger.entries(), first.as_slice());
}

#[test]
fn parse_history_entries_skips_malformed_records() {
    let raw = r#"[
        {"id":"603","media_type":"movie","title":"The Matrix","progress":125.9,"duration":8160,"updated_at":1700000000000},
        {"media_type":"movie","title":"no id"},
        {"id":"9","media_type":"hologram","title":"bad type"},
        {"id":"100","media_type":"tv","title":"Dark","season":2,"episode":5,"progress":61,"duration":2400,"updated_at":1}
    ]"#;
    let (entries, skipped) = parse_history_entries(raw);
    assert_eq!(entries.len(), 2);
    assert_eq!(skipped, 2);
    assert_eq!(entries[0].id, "603");
    assert_eq!(entries[1].season, Some(2));
}

#[test]
fn parse_history_entries_rejects_non_array_payloads() {
    assert_eq!(parse_history_entries("not json").1, 1);
    assert_eq!(parse_history_entries(r#"{"id":"603"}"#).1, 1);
    assert!(parse_history_entries("not json").0.is_empty());
}

#[test]
fn bookmark_toggle_adds_newest_first_and_removes_by_id() {
    let mut bookmarks = BookmarkList::default();
    assert!(bookmarks.toggle(&movie("603", "The Matrix")));
    assert!(bookmarks.toggle(&show("100", "Dark")));
    assert_eq!(bookmarks.items()[0].id, "100");
    assert!(bookmarks.contains("603"));

    assert!(!bookmarks.toggle(&movie("603", "The Matrix")));
    assert!(!bookmarks.contains("603"));
    assert_eq!(bookmarks.items().len(), 1);
}

#[test]
fn parse_bookmark_items_skips_malformed_records() {
    let raw = r#"[
        {"id":"603","media_type":"movie","title":"The Matrix"},
        {"id":"","media_type":"movie","title":"empty id"},
        {"id":"100","media_type":"tv","title":"Dark","poster":"/dark.jpg"}
    ]"#;
    let (items, skipped) = parse_bookmark_items(raw);
    assert_eq!(items.len(), 2);
    assert_eq!(skipped, 1);
    assert_eq!(items[1].poster_path.as_deref(), Some("/dark.jpg"));
}

// ---- PlaybackStateMachine ----

#[test]
fn select_media_starts_a_fresh_session_and_requests_episodes_for_tv() {
    let mut machine = PlaybackStateMachine::new();
    let outcome = machine.select_media(show("100", "Dark"), 2, 3);

    let session = machine.session().expect("session should be loaded");
    assert_eq!(session.season, 2);
    assert_eq!(session.episode, 3);
    assert!(session.last_player_state.is_none());
    assert_eq!(
        outcome.fetch,
        Some(EpisodeFetch {
            media_id: "100".to_string(),
            season: 2,
        })
    );
}

#[test]
fn select_media_for_a_movie_requests_no_episode_fetch() {
    let mut machine = PlaybackStateMachine::new();
    let outcome = machine.select_media(movie("603", "The Matrix"), 1, 1);
    assert_eq!(outcome.fetch, None);
}

#[test]
fn player_initiated_episode_change_leaves_reload_token_alone() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 1, 3);
    let token = machine.session().expect("loaded").reload_token;

    let outcome = machine.on_player_event(PlaybackEvent {
        season: Some(1),
        episode: Some(4),
        ..event("play")
    });

    let session = machine.session().expect("loaded");
    assert!(outcome.navigated);
    assert_eq!(session.episode, 4);
    assert_eq!(session.reload_token, token);
    assert_eq!(outcome.fetch, None);
}

#[test]
fn app_initiated_episode_change_bumps_reload_token() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 1, 3);
    let token = machine.session().expect("loaded").reload_token;

    machine.select_episode(4);

    let session = machine.session().expect("loaded");
    assert_eq!(session.episode, 4);
    assert_eq!(session.reload_token, token + 1);
}

#[test]
fn player_initiated_season_change_requests_fetch_but_no_reload() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 1, 8);
    let token = machine.session().expect("loaded").reload_token;

    let outcome = machine.on_player_event(PlaybackEvent {
        season: Some(2),
        episode: Some(1),
        ..event("play")
    });

    let session = machine.session().expect("loaded");
    assert_eq!(session.season, 2);
    assert_eq!(session.episode, 1);
    assert_eq!(session.reload_token, token);
    assert_eq!(
        outcome.fetch,
        Some(EpisodeFetch {
            media_id: "100".to_string(),
            season: 2,
        })
    );
}

#[test]
fn select_season_resets_episode_and_bumps_token_once() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 1, 7);
    let token = machine.session().expect("loaded").reload_token;

    let outcome = machine.select_season(3);

    let session = machine.session().expect("loaded");
    assert_eq!(session.season, 3);
    assert_eq!(session.episode, 1);
    assert_eq!(session.reload_token, token + 1);
    assert_eq!(
        outcome.fetch,
        Some(EpisodeFetch {
            media_id: "100".to_string(),
            season: 3,
        })
    );
}

#[test]
fn season_and_episode_selection_are_noops_for_movies() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(movie("603", "The Matrix"), 1, 1);
    let token = machine.session().expect("loaded").reload_token;

    assert_eq!(machine.select_season(2), SelectOutcome::default());
    assert_eq!(machine.select_episode(2), SelectOutcome::default());
    assert_eq!(machine.session().expect("loaded").reload_token, token);
}

#[test]
fn player_events_while_idle_are_ignored() {
    let mut machine = PlaybackStateMachine::new();
    let outcome = machine.on_player_event(timeupdate(61.0));
    assert!(!outcome.accepted);
    assert!(outcome.history.is_none());
    assert!(machine.is_idle());
}

#[test]
fn events_after_teardown_are_ignored() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 1, 1);
    machine.clear();

    let outcome = machine.on_player_event(PlaybackEvent {
        season: Some(2),
        episode: Some(2),
        ..timeupdate(61.0)
    });
    assert!(!outcome.accepted);
    assert!(machine.is_idle());
}

#[test]
fn timeupdate_writes_history_only_near_interval_boundaries() {
    assert!(should_record_history(&timeupdate(61.0)));
    assert!(should_record_history(&timeupdate(0.0)));
    assert!(should_record_history(&timeupdate(90.5)));
    assert!(!should_record_history(&timeupdate(75.0)));
    assert!(!should_record_history(&timeupdate(29.5)));
}

#[test]
fn timeupdate_without_position_writes_nothing() {
    assert!(!should_record_history(&event("timeupdate")));
}

#[test]
fn pause_and_ended_always_write_history() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(movie("603", "The Matrix"), 1, 1);

    let paused = machine.on_player_event(PlaybackEvent {
        current_time: Some(75.0),
        ..event("pause")
    });
    assert!(paused.history.is_some());

    let ended = machine.on_player_event(event("ended"));
    let entry = ended.history.expect("ended should write history");
    assert_eq!(entry.progress_seconds, 0.0);
}

#[test]
fn other_event_kinds_do_not_write_history() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(movie("603", "The Matrix"), 1, 1);
    for kind in ["play", "seeked", "buffering"] {
        let outcome = machine.on_player_event(event(kind));
        assert!(outcome.history.is_none(), "{kind} should not write");
    }
}

#[test]
fn history_entries_fall_back_to_session_position() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 2, 7);

    let outcome = machine.on_player_event(PlaybackEvent {
        current_time: Some(61.0),
        duration: Some(2400.0),
        ..event("timeupdate")
    });
    let entry = outcome.history.expect("throttle window should write");
    assert_eq!(entry.season, Some(2));
    assert_eq!(entry.episode, Some(7));
    assert_eq!(entry.progress_seconds, 61.0);
    assert_eq!(entry.duration_seconds, 2400.0);
}

#[test]
fn movie_history_entries_carry_no_season_or_episode() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(movie("603", "The Matrix"), 1, 1);
    let outcome = machine.on_player_event(PlaybackEvent {
        // A confused player reporting positions for a movie.
        season: Some(3),
        episode: Some(9),
        current_time: Some(30.0),
        ..event("pause")
    });
    let entry = outcome.history.expect("pause should write");
    assert_eq!(entry.season, None);
    assert_eq!(entry.episode, None);
}

#[test]
fn last_player_state_tracks_the_latest_event() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 1, 1);
    machine.on_player_event(event("play"));
    machine.on_player_event(timeupdate(75.0));

    let session = machine.session().expect("loaded");
    let last = session.last_player_state.as_ref().expect("stored");
    assert_eq!(last.kind, "timeupdate");
    assert_eq!(last.current_time, Some(75.0));
}

#[test]
fn select_media_replaces_the_session_wholesale() {
    let mut machine = PlaybackStateMachine::new();
    machine.select_media(show("100", "Dark"), 2, 5);
    machine.on_player_event(timeupdate(61.0));
    let first_token = machine.session().expect("loaded").reload_token;

    machine.select_media(movie("603", "The Matrix"), 1, 1);

    let session = machine.session().expect("loaded");
    assert_eq!(session.media.id, "603");
    assert!(session.last_player_state.is_none());
    assert!(session.reload_token > first_token);
}

#[test]
fn reload_token_is_monotonic_across_transitions() {
    let mut machine = PlaybackStateMachine::new();
    let mut seen = Vec::new();
    machine.select_media(show("100", "Dark"), 1, 1);
    seen.push(machine.session().expect("loaded").reload_token);
    machine.select_episode(2);
    seen.push(machine.session().expect("loaded").reload_token);
    machine.select_season(2);
    seen.push(machine.session().expect("loaded").reload_token);
    machine.select_media(show("200", "Other"), 1, 1);
    seen.push(machine.session().expect("loaded").reload_token);

    let mut sorted = seen.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(seen, sorted, "tokens must strictly increase: {seen:?}");
}

// ---- ResumeResolver ----

#[test]
fn resolve_returns_zero_for_unknown_identity() {
    let ledger = HistoryLedger::new();
    assert_eq!(resolve_resume(&ledger, "603", MediaType::Movie, None, None), 0);
}

#[test]
fn resolve_floors_fractional_progress() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(movie_entry("603", 125.9, 8160.0));
    assert_eq!(resolve_resume(&ledger, "603", MediaType::Movie, None, None), 125);
}

#[test]
fn resolve_requires_exact_episode_match_for_tv() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(tv_entry("100", 2, 5, 600.0));

    assert_eq!(
        resolve_resume(&ledger, "100", MediaType::Tv, Some(2), Some(5)),
        600
    );
    assert_eq!(
        resolve_resume(&ledger, "100", MediaType::Tv, Some(2), Some(6)),
        0
    );
    assert_eq!(
        resolve_resume(&ledger, "100", MediaType::Tv, Some(1), Some(5)),
        0
    );
}

#[test]
fn finished_threshold_is_inclusive_at_95_percent() {
    assert!(is_finished(&movie_entry("1", 95.0, 100.0)));
    assert!(!is_finished(&movie_entry("1", 94.9, 100.0)));
    assert!(is_finished(&movie_entry("1", 100.0, 100.0)));
}

#[test]
fn zero_duration_entries_never_count_as_finished() {
    assert!(!is_finished(&movie_entry("1", 500.0, 0.0)));
    assert_eq!(progress_ratio(&movie_entry("1", 500.0, 0.0)), None);
}

#[test]
fn resume_position_restarts_finished_titles() {
    let mut ledger = HistoryLedger::new();
    ledger.merge(movie_entry("603", 96.0, 100.0));
    ledger.merge(movie_entry("604", 50.0, 100.0));

    assert_eq!(resume_position(&ledger, "603", MediaType::Movie, None, None), 0);
    assert_eq!(resume_position(&ledger, "604", MediaType::Movie, None, None), 50);
}

// ---- PlayerURLBuilder ----

#[test]
fn movie_url_carries_id_and_resume_progress() {
    let url = build_embed_url("603", MediaType::Movie, 1, 1, 90);
    assert!(url.contains("/embed/movie/603"), "url: {url}");
    assert!(url.contains("progress=90"), "url: {url}");
    assert!(url.contains("color=6366f1"), "url: {url}");
}

#[test]
fn movie_url_omits_progress_when_starting_fresh() {
    let url = build_embed_url("603", MediaType::Movie, 1, 1, 0);
    assert_eq!(url, "https://www.vidking.net/embed/movie/603?color=6366f1");
}

#[test]
fn tv_url_encodes_position_and_player_flags() {
    let url = build_embed_url("100", MediaType::Tv, 2, 5, 125);
    assert_eq!(
        url,
        "https://www.vidking.net/embed/tv/100/2/5?episodeSelector=true&nextEpisode=true&color=6366f1&progress=125"
    );
}

// ---- CatalogClient parsing & cache ----

#[test]
fn parse_media_results_skips_records_missing_id_or_title() {
    let value = json!({
        "results": [
            {"id": 603, "title": "The Matrix", "release_date": "1999-03-30"},
            {"title": "No Id"},
            {"id": 7, "name": ""},
            {"id": 100, "name": "Dark", "first_air_date": "2017-12-01"}
        ]
    });
    let results = parse_media_results(&value, None);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "603");
    assert_eq!(results[0].media_type, MediaType::Movie);
    assert_eq!(results[1].media_type, MediaType::Tv);
    assert_eq!(results[1].release_year(), Some("2017"));
}

#[test]
fn parse_media_summary_filters_people_from_multi_search() {
    let person = json!({"id": 9, "name": "Keanu Reeves", "media_type": "person"});
    assert!(parse_media_summary(&person, None).is_none());
}

#[test]
fn parse_media_summary_uses_fallback_type_for_bare_lists() {
    let item = json!({"id": 603, "title": "The Matrix"});
    let summary = parse_media_summary(&item, Some(MediaType::Movie)).expect("should parse");
    assert_eq!(summary.media_type, MediaType::Movie);
}

#[test]
fn parse_episode_list_tolerates_missing_fields() {
    let value = json!({
        "episodes": [
            {"episode_number": 1, "name": "Secrets", "overview": "..."},
            {"name": "No Number"},
            {"episode_number": 2, "name": "  "},
        ]
    });
    let episodes = parse_episode_list(&value);
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].number, 1);
    assert_eq!(episodes[1].name, "Untitled");
}

#[test]
fn parse_episode_list_is_empty_for_unexpected_shapes() {
    assert!(parse_episode_list(&json!({"error": "nope"})).is_empty());
    assert!(parse_episode_list(&json!([])).is_empty());
}

#[test]
fn parse_media_details_skips_season_zero_specials() {
    let value = json!({
        "id": 100,
        "name": "Dark",
        "number_of_episodes": 26,
        "seasons": [
            {"season_number": 0},
            {"season_number": 1},
            {"season_number": 2}
        ],
        "genres": [{"name": "Drama"}, {"name": "Sci-Fi"}]
    });
    let details = parse_media_details(&value, "100", MediaType::Tv).expect("should parse");
    assert_eq!(details.season_numbers, vec![1, 2]);
    assert_eq!(details.genres, vec!["Drama", "Sci-Fi"]);
    assert_eq!(details.number_of_episodes, Some(26));
}

#[test]
fn catalog_cache_serves_fresh_entries_and_expires_old_ones() {
    let client = CatalogClient::new("http://127.0.0.1:1", "test-key".to_string());
    let query: Vec<(String, String)> = Vec::new();

    client.seed_cache_at("/trending/all/week", &query, Instant::now(), json!({"fresh": true}));
    let cached = client
        .cached_for_test("/trending/all/week", &query)
        .expect("fresh entry should be served");
    assert_eq!(cached, json!({"fresh": true}));

    // checked_sub: Instant cannot represent times from before boot.
    if let Some(expired_at) = Instant::now().checked_sub(CACHE_TTL + Duration::from_secs(1)) {
        client.seed_cache_at("/movie/popular", &query, expired_at, json!({"stale": true}));
        assert!(
            client.cached_for_test("/movie/popular", &query).is_none(),
            "expired entry must not be served"
        );
    }
}
