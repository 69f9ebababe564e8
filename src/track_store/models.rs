use serde::{Deserialize, Serialize};

/// The canonical set of normalized audio features.
///
/// Every feature is in [0,1]; tempo is pre-normalized at import time. Keeping
/// the set as an enum (instead of free-form string keys) means a renamed or
/// missing feature is a compile error, not a silently-empty aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioFeature {
    Danceability,
    Energy,
    Acousticness,
    Valence,
    TempoNorm,
    Instrumentalness,
    Liveness,
    Speechiness,
}

impl AudioFeature {
    pub const COUNT: usize = 8;

    pub const ALL: [AudioFeature; Self::COUNT] = [
        AudioFeature::Danceability,
        AudioFeature::Energy,
        AudioFeature::Acousticness,
        AudioFeature::Valence,
        AudioFeature::TempoNorm,
        AudioFeature::Instrumentalness,
        AudioFeature::Liveness,
        AudioFeature::Speechiness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFeature::Danceability => "danceability",
            AudioFeature::Energy => "energy",
            AudioFeature::Acousticness => "acousticness",
            AudioFeature::Valence => "valence",
            AudioFeature::TempoNorm => "tempo_norm",
            AudioFeature::Instrumentalness => "instrumentalness",
            AudioFeature::Liveness => "liveness",
            AudioFeature::Speechiness => "speechiness",
        }
    }

    pub fn from_str(s: &str) -> Option<AudioFeature> {
        Self::ALL.iter().find(|f| f.as_str() == s).copied()
    }

    /// Index of this feature in [`AudioFeature::ALL`], usable as an array key.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Immutable catalog track. Owned by the track store; the matching engine
/// only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub track_id: String,
    pub track_name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    pub album_name: Option<String>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub popularity_norm: Option<f64>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub acousticness: Option<f64>,
    pub valence: Option<f64>,
    pub tempo_norm: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub speechiness: Option<f64>,
    pub track_genre: Option<String>,
    pub track_genre_group: Option<String>,
}

impl Track {
    pub fn feature(&self, feature: AudioFeature) -> Option<f64> {
        match feature {
            AudioFeature::Danceability => self.danceability,
            AudioFeature::Energy => self.energy,
            AudioFeature::Acousticness => self.acousticness,
            AudioFeature::Valence => self.valence,
            AudioFeature::TempoNorm => self.tempo_norm,
            AudioFeature::Instrumentalness => self.instrumentalness,
            AudioFeature::Liveness => self.liveness,
            AudioFeature::Speechiness => self.speechiness,
        }
    }

    /// Coarse genre bucket used for diversification and scoring: the genre
    /// group when present, else the raw genre tag, else "misc".
    pub fn genre_key(&self) -> &str {
        self.track_genre_group
            .as_deref()
            .or(self.track_genre.as_deref())
            .unwrap_or("misc")
    }

    /// Genre used for on-genre candidate matching: raw tag first, then group.
    pub fn genre_tag(&self) -> Option<&str> {
        self.track_genre
            .as_deref()
            .or(self.track_genre_group.as_deref())
    }

    pub fn name_lowercase(&self) -> String {
        self.track_name.to_lowercase()
    }
}
