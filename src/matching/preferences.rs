//! Preference model: turns a user's accumulated swipe aggregates into
//! per-feature targets and a ranked genre list.

use crate::track_store::{AudioFeature, Track};
use crate::user_store::UserProfile;

/// Blend weights when both liked and disliked means are available: lean
/// toward the liked region, softly repel the disliked one.
const LIKED_BLEND_WEIGHT: f64 = 0.7;
const DISLIKED_BLEND_WEIGHT: f64 = 0.3;

/// How much a dislike counts against a genre relative to a like.
const DISLIKE_GENRE_PENALTY: f64 = 0.5;

/// Per-feature target values in [0,1] representing the user's inferred taste.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePreferences([f64; AudioFeature::COUNT]);

impl FeaturePreferences {
    pub fn get(&self, feature: AudioFeature) -> f64 {
        self.0[feature.index()]
    }

    #[cfg(test)]
    pub fn with_value(feature: AudioFeature, value: f64) -> Self {
        let mut prefs = Self([0.5; AudioFeature::COUNT]);
        prefs.0[feature.index()] = value;
        prefs
    }
}

/// Computes the target value for every canonical feature.
///
/// Per feature: no data at all is neutral (0.5); only likes pull the target
/// to the liked mean; only dislikes push it to the opposite region
/// (1 - disliked mean); with both, the liked mean dominates a 70/30 blend.
/// Targets are clamped to [0,1].
pub fn build_feature_preferences(profile: &UserProfile) -> FeaturePreferences {
    let mut targets = [0.5f64; AudioFeature::COUNT];

    for feature in AudioFeature::ALL {
        let liked_mean = if profile.likes_count > 0 {
            Some(profile.feature_sums_liked.get(feature) / profile.likes_count as f64)
        } else {
            None
        };
        let disliked_mean = if profile.dislikes_count > 0 {
            Some(profile.feature_sums_disliked.get(feature) / profile.dislikes_count as f64)
        } else {
            None
        };

        let target = match (liked_mean, disliked_mean) {
            (None, None) => 0.5,
            (Some(liked), None) => liked,
            (None, Some(disliked)) => 1.0 - disliked,
            (Some(liked), Some(disliked)) => {
                LIKED_BLEND_WEIGHT * liked + DISLIKED_BLEND_WEIGHT * (1.0 - disliked)
            }
        };
        targets[feature.index()] = target.clamp(0.0, 1.0);
    }

    FeaturePreferences(targets)
}

/// Ranks genres by `likes - 0.5 * dislikes`, descending, ties broken by
/// first-seen order. Genres with non-positive scores still make the cut if
/// nothing better exists.
pub fn top_genres(profile: &UserProfile, limit: usize) -> Vec<String> {
    let mut scores: Vec<(String, f64)> = Vec::new();
    for (genre, count) in profile.liked_genres.iter() {
        bump_score(&mut scores, genre, count as f64);
    }
    for (genre, count) in profile.disliked_genres.iter() {
        bump_score(&mut scores, genre, -DISLIKE_GENRE_PENALTY * count as f64);
    }

    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    scores.into_iter().take(limit).map(|(g, _)| g).collect()
}

/// Fallback genre ranking derived from library tracks alone, for users with
/// no swipe aggregates yet.
pub fn library_top_genres(tracks: &[Track], limit: usize) -> Vec<String> {
    let mut counts: Vec<(String, f64)> = Vec::new();
    for track in tracks {
        if let Some(genre) = track
            .track_genre_group
            .as_deref()
            .or(track.track_genre.as_deref())
        {
            bump_score(&mut counts, genre, 1.0);
        }
    }
    counts.sort_by(|a, b| b.1.total_cmp(&a.1));
    counts.into_iter().take(limit).map(|(g, _)| g).collect()
}

fn bump_score(scores: &mut Vec<(String, f64)>, genre: &str, delta: f64) {
    match scores.iter_mut().find(|(g, _)| g == genre) {
        Some((_, score)) => *score += delta,
        None => scores.push((genre.to_string(), delta)),
    }
}
