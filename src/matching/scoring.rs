//! Candidate scoring: genre alignment + feature similarity + popularity.

use super::preferences::FeaturePreferences;
use crate::track_store::{AudioFeature, Track};
use std::collections::HashMap;

/// Weights for the combined candidate score.
const GENRE_WEIGHT: f64 = 0.45;
const FEATURE_WEIGHT: f64 = 0.45;
const POPULARITY_WEIGHT: f64 = 0.10;

/// Turns an ordered top-genre list into a weight map: rank `i` (0-indexed)
/// of `n` genres gets weight `(n - i) / n`, so the first genre scores 1.0
/// and the last `1/n`. Genres absent from the map score 0.
pub fn genre_weight_map(top_genres: &[String]) -> HashMap<String, f64> {
    let n = top_genres.len();
    top_genres
        .iter()
        .enumerate()
        .map(|(i, genre)| (genre.clone(), (n - i) as f64 / n as f64))
        .collect()
}

/// Mean over features present on the track of `max(0, 1 - |track - pref|)`.
/// Returns 0 when no feature pairs are usable.
pub fn feature_similarity(track: &Track, preferences: &FeaturePreferences) -> f64 {
    let mut sim_sum = 0.0;
    let mut pairs = 0usize;
    for feature in AudioFeature::ALL {
        if let Some(track_value) = track.feature(feature) {
            let diff = (track_value - preferences.get(feature)).abs();
            sim_sum += (1.0 - diff).max(0.0);
            pairs += 1;
        }
    }
    if pairs == 0 {
        return 0.0;
    }
    sim_sum / pairs as f64
}

/// Combined score for one candidate track.
pub fn score_track(
    track: &Track,
    preferences: &FeaturePreferences,
    genre_weights: &HashMap<String, f64>,
) -> f64 {
    let genre_score = genre_weights.get(track.genre_key()).copied().unwrap_or(0.0);
    let feature_score = feature_similarity(track, preferences);
    let popularity = track.popularity_norm.unwrap_or(0.0);

    GENRE_WEIGHT * genre_score + FEATURE_WEIGHT * feature_score + POPULARITY_WEIGHT * popularity
}

/// Scores and ranks a candidate pool, returning the top `limit` track ids,
/// best first. The sort is stable, so equal scores keep pool order.
pub fn rank_candidates(
    candidates: &[Track],
    preferences: &FeaturePreferences,
    genre_weights: &HashMap<String, f64>,
    limit: usize,
) -> Vec<String> {
    let mut scored: Vec<(f64, &Track)> = candidates
        .iter()
        .map(|track| (score_track(track, preferences, genre_weights), track))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, track)| track.track_id.clone())
        .collect()
}
