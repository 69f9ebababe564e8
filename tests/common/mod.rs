//! Common test infrastructure
//!
//! Builds real SQLite-backed stores in a temp directory, seeds them with a
//! small two-genre catalog and wires up an engine with a fixed RNG seed so
//! flows are reproducible.

// Not every test binary uses every helper.
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tempfile::TempDir;

use trackmatch_server::config::MatchingSettings;
use trackmatch_server::matching::MatchEngine;
use trackmatch_server::server::ServerState;
use trackmatch_server::track_store::{SqliteTrackStore, Track};
use trackmatch_server::user_store::SqliteUserStore;

pub const RNG_SEED: u64 = 20240915;

pub struct TestHarness {
    pub engine: Arc<MatchEngine>,
    pub track_store: Arc<SqliteTrackStore>,
    pub user_store: Arc<SqliteUserStore>,
    // Held so the databases outlive the harness.
    _tmp: TempDir,
}

pub fn make_track(id: &str, name: &str, genre: &str, popularity: f64, energy: f64) -> Track {
    Track {
        track_id: id.to_string(),
        track_name: name.to_string(),
        artists: vec!["Test Artist".to_string()],
        album_name: Some("Test Album".to_string()),
        duration_ms: Some(180_000),
        explicit: Some(false),
        popularity_norm: Some(popularity),
        danceability: Some(0.5),
        energy: Some(energy),
        acousticness: Some(0.3),
        valence: Some(0.6),
        tempo_norm: Some(0.5),
        instrumentalness: Some(0.1),
        liveness: Some(0.2),
        speechiness: Some(0.05),
        track_genre: Some(genre.to_string()),
        track_genre_group: Some(genre.to_string()),
    }
}

/// Six popular tracks, three pop and three rock, all above the default
/// seed popularity floor.
pub fn test_catalog() -> Vec<Track> {
    vec![
        make_track("pop-1", "Summer Lights", "pop", 0.95, 0.8),
        make_track("pop-2", "Neon Heart", "pop", 0.9, 0.7),
        make_track("pop-3", "Paper Moon", "pop", 0.85, 0.75),
        make_track("rock-1", "Iron Sky", "rock", 0.92, 0.9),
        make_track("rock-2", "Gravel Road", "rock", 0.88, 0.85),
        make_track("rock-3", "Last Amp Standing", "rock", 0.8, 0.95),
    ]
}

pub fn harness_with(tracks: Vec<Track>, settings: MatchingSettings) -> TestHarness {
    let tmp = TempDir::new().unwrap();
    let track_store = Arc::new(SqliteTrackStore::new(tmp.path().join("tracks.db")).unwrap());
    track_store.insert_tracks(&tracks).unwrap();
    let user_store = Arc::new(SqliteUserStore::new(tmp.path().join("users.db")).unwrap());

    let engine = Arc::new(MatchEngine::with_rng(
        track_store.clone(),
        user_store.clone(),
        settings,
        StdRng::seed_from_u64(RNG_SEED),
    ));

    TestHarness {
        engine,
        track_store,
        user_store,
        _tmp: tmp,
    }
}

pub fn harness() -> TestHarness {
    harness_with(test_catalog(), MatchingSettings::default())
}

impl TestHarness {
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            self.engine.clone(),
            self.track_store.clone(),
            self.user_store.clone(),
        )
    }
}
