use crate::track_store::{AudioFeature, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-genre swipe counters, in first-seen order.
///
/// Order matters: top-genre ranking breaks ties by whichever genre was seen
/// first, so this is a vec of pairs rather than a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreCounts(Vec<(String, u32)>);

impl GenreCounts {
    pub fn increment(&mut self, genre: &str) {
        match self.0.iter_mut().find(|(g, _)| g == genre) {
            Some((_, count)) => *count += 1,
            None => self.0.push((genre.to_string(), 1)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(g, c)| (g.as_str(), *c))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Running per-feature sums over liked (or disliked) tracks.
///
/// Every canonical feature always has an entry, defaulting to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSums([f64; AudioFeature::COUNT]);

impl FeatureSums {
    pub fn get(&self, feature: AudioFeature) -> f64 {
        self.0[feature.index()]
    }

    pub fn add(&mut self, feature: AudioFeature, value: f64) {
        self.0[feature.index()] += value;
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for feature in AudioFeature::ALL {
            map.insert(feature.as_str().to_string(), self.get(feature).into());
        }
        Value::Object(map)
    }

    /// Unknown keys in the payload are ignored; missing keys default to 0.
    pub fn from_json(value: &Value) -> Self {
        let mut sums = Self::default();
        if let Some(map) = value.as_object() {
            for (key, entry) in map {
                if let (Some(feature), Some(v)) = (AudioFeature::from_str(key), entry.as_f64()) {
                    sums.0[feature.index()] = v;
                }
            }
        }
        sums
    }
}

/// Per-user taste aggregate, built up swipe by swipe.
///
/// Created lazily on first session creation or first interaction; mutated
/// only by swipe registration.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub likes_count: u64,
    pub dislikes_count: u64,
    pub liked_genres: GenreCounts,
    pub disliked_genres: GenreCounts,
    pub feature_sums_liked: FeatureSums,
    pub feature_sums_disliked: FeatureSums,
}

impl UserProfile {
    pub fn new(username: &str) -> Self {
        let now = Utc::now();
        Self {
            username: username.to_string(),
            created_at: now,
            last_active_at: now,
            likes_count: 0,
            dislikes_count: 0,
            liked_genres: GenreCounts::default(),
            disliked_genres: GenreCounts::default(),
            feature_sums_liked: FeatureSums::default(),
            feature_sums_disliked: FeatureSums::default(),
        }
    }

    /// Folds one swipe into the aggregates.
    pub fn apply_swipe(&mut self, track: &Track, liked: bool) {
        if liked {
            self.likes_count += 1;
        } else {
            self.dislikes_count += 1;
        }

        // Group-level genre when available, raw tag otherwise; tracks with
        // no genre at all contribute nothing to the genre counters.
        if let Some(genre) = track
            .track_genre_group
            .as_deref()
            .or(track.track_genre.as_deref())
        {
            let genre_counts = if liked {
                &mut self.liked_genres
            } else {
                &mut self.disliked_genres
            };
            genre_counts.increment(genre);
        }

        let feature_sums = if liked {
            &mut self.feature_sums_liked
        } else {
            &mut self.feature_sums_disliked
        };
        for feature in AudioFeature::ALL {
            if let Some(value) = track.feature(feature) {
                feature_sums.add(feature, value);
            }
        }

        self.last_active_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with_features(genre_group: Option<&str>, genre: Option<&str>) -> Track {
        Track {
            track_id: "t".to_string(),
            track_name: "T".to_string(),
            artists: vec![],
            album_name: None,
            duration_ms: None,
            explicit: None,
            popularity_norm: Some(0.5),
            danceability: Some(0.8),
            energy: Some(0.6),
            acousticness: None,
            valence: Some(0.4),
            tempo_norm: None,
            instrumentalness: None,
            liveness: None,
            speechiness: None,
            track_genre: genre.map(String::from),
            track_genre_group: genre_group.map(String::from),
        }
    }

    #[test]
    fn test_apply_swipe_updates_counts_and_sums() {
        let mut profile = UserProfile::new("alice");
        let track = track_with_features(Some("electronic"), Some("synthpop"));

        profile.apply_swipe(&track, true);
        profile.apply_swipe(&track, true);
        profile.apply_swipe(&track, false);

        assert_eq!(profile.likes_count, 2);
        assert_eq!(profile.dislikes_count, 1);
        assert_eq!(
            profile.liked_genres.iter().collect::<Vec<_>>(),
            vec![("electronic", 2)]
        );
        assert_eq!(
            profile.disliked_genres.iter().collect::<Vec<_>>(),
            vec![("electronic", 1)]
        );
        assert_eq!(
            profile.feature_sums_liked.get(AudioFeature::Danceability),
            1.6
        );
        // Missing features contribute nothing
        assert_eq!(
            profile.feature_sums_liked.get(AudioFeature::Acousticness),
            0.0
        );
        assert_eq!(
            profile.feature_sums_disliked.get(AudioFeature::Energy),
            0.6
        );
    }

    #[test]
    fn test_apply_swipe_without_genre_skips_genre_counts() {
        let mut profile = UserProfile::new("bob");
        profile.apply_swipe(&track_with_features(None, None), true);
        assert!(profile.liked_genres.is_empty());
        assert_eq!(profile.likes_count, 1);
    }

    #[test]
    fn test_genre_counts_preserve_first_seen_order() {
        let mut counts = GenreCounts::default();
        counts.increment("rock");
        counts.increment("pop");
        counts.increment("rock");
        assert_eq!(
            counts.iter().collect::<Vec<_>>(),
            vec![("rock", 2), ("pop", 1)]
        );
    }

    #[test]
    fn test_feature_sums_json_round_trip() {
        let mut sums = FeatureSums::default();
        sums.add(AudioFeature::Energy, 1.25);
        sums.add(AudioFeature::Valence, 0.5);

        let json = sums.to_json();
        let restored = FeatureSums::from_json(&json);
        assert_eq!(restored, sums);

        // Unknown keys are ignored, missing ones default to zero
        let partial = serde_json::json!({"energy": 2.0, "loudness": 9.9});
        let restored = FeatureSums::from_json(&partial);
        assert_eq!(restored.get(AudioFeature::Energy), 2.0);
        assert_eq!(restored.get(AudioFeature::Valence), 0.0);
    }
}
