//! SQLite-backed track catalog store.

use super::models::Track;
use super::trait_def::TrackStore;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, Column, SqlType, Table, VersionedSchema,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// V 0
const TRACK_TABLE_V_0: Table = Table {
    name: "track",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("track_name", &SqlType::Text, non_null = true),
        sqlite_column!("track_name_lowercase", &SqlType::Text, non_null = true),
        sqlite_column!("artists", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("album_name", &SqlType::Text),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("explicit", &SqlType::Integer),
        sqlite_column!("popularity_norm", &SqlType::Real),
        sqlite_column!("danceability", &SqlType::Real),
        sqlite_column!("energy", &SqlType::Real),
        sqlite_column!("acousticness", &SqlType::Real),
        sqlite_column!("valence", &SqlType::Real),
        sqlite_column!("tempo_norm", &SqlType::Real),
        sqlite_column!("instrumentalness", &SqlType::Real),
        sqlite_column!("liveness", &SqlType::Real),
        sqlite_column!("speechiness", &SqlType::Real),
        sqlite_column!("track_genre", &SqlType::Text),
        sqlite_column!("track_genre_group", &SqlType::Text),
    ],
    indices: &[
        ("idx_track_popularity", "popularity_norm"),
        ("idx_track_name_lowercase", "track_name_lowercase"),
    ],
    unique_constraints: &[],
};

const TRACK_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TRACK_TABLE_V_0],
    migration: None,
}];

const TRACK_COLUMNS: &str = "track_id, track_name, artists, album_name, duration_ms, explicit, \
     popularity_norm, danceability, energy, acousticness, valence, tempo_norm, \
     instrumentalness, liveness, speechiness, track_genre, track_genre_group";

/// SQLite-backed implementation of [`TrackStore`].
#[derive(Clone)]
pub struct SqliteTrackStore {
    conn: Arc<Mutex<Connection>>,
}

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    let artists_json: String = row.get(2)?;
    let artists: Vec<String> = serde_json::from_str(&artists_json).unwrap_or_default();
    Ok(Track {
        track_id: row.get(0)?,
        track_name: row.get(1)?,
        artists,
        album_name: row.get(3)?,
        duration_ms: row.get(4)?,
        explicit: row.get::<_, Option<i64>>(5)?.map(|v| v != 0),
        popularity_norm: row.get(6)?,
        danceability: row.get(7)?,
        energy: row.get(8)?,
        acousticness: row.get(9)?,
        valence: row.get(10)?,
        tempo_norm: row.get(11)?,
        instrumentalness: row.get(12)?,
        liveness: row.get(13)?,
        speechiness: row.get(14)?,
        track_genre: row.get(15)?,
        track_genre_group: row.get(16)?,
    })
}

impl SqliteTrackStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .context("Failed to open track database")?;
        migrate_if_needed(&mut conn, TRACK_VERSIONED_SCHEMAS, "track")?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on track database")?;

        let count: usize = conn.query_row("SELECT COUNT(*) FROM track", [], |r| r.get(0))?;
        info!("Track store ready: {} tracks in catalog", count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Inserts or replaces a batch of tracks in a single transaction.
    pub fn insert_tracks(&self, tracks: &[Track]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO track (track_id, track_name, track_name_lowercase, \
                 artists, album_name, duration_ms, explicit, popularity_norm, danceability, \
                 energy, acousticness, valence, tempo_norm, instrumentalness, liveness, \
                 speechiness, track_genre, track_genre_group) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;
            for track in tracks {
                stmt.execute(params![
                    track.track_id,
                    track.track_name,
                    track.name_lowercase(),
                    serde_json::to_string(&track.artists)?,
                    track.album_name,
                    track.duration_ms,
                    track.explicit.map(|b| b as i64),
                    track.popularity_norm,
                    track.danceability,
                    track.energy,
                    track.acousticness,
                    track.valence,
                    track.tempo_norm,
                    track.instrumentalness,
                    track.liveness,
                    track.speechiness,
                    track.track_genre,
                    track.track_genre_group,
                ])?;
            }
        }
        tx.commit()?;
        Ok(tracks.len())
    }

    /// Loads a JSON array of tracks (a catalog dump) into the store.
    pub fn load_tracks_json<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let json = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read track dump {:?}", path.as_ref()))?;
        let tracks: Vec<Track> =
            serde_json::from_str(&json).context("Failed to parse track dump")?;
        let count = self.insert_tracks(&tracks)?;
        info!("Imported {} tracks from {:?}", count, path.as_ref());
        Ok(count)
    }

    fn query_by_popularity(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM track WHERE popularity_norm >= ?1 \
             ORDER BY popularity_norm DESC LIMIT ?2",
            TRACK_COLUMNS
        ))?;
        let tracks = stmt
            .query_map(params![min_popularity, limit], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }
}

impl TrackStore for SqliteTrackStore {
    fn get_track(&self, track_id: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let track = conn
            .query_row(
                &format!("SELECT {} FROM track WHERE track_id = ?1", TRACK_COLUMNS),
                params![track_id],
                track_from_row,
            )
            .optional()?;
        Ok(track)
    }

    fn get_tracks(&self, track_ids: &[String]) -> Result<Vec<Track>> {
        // One lookup per id keeps the input order and avoids building a
        // variable-length IN clause; batches here are small (library sized).
        let mut tracks = Vec::with_capacity(track_ids.len());
        for track_id in track_ids {
            if let Some(track) = self.get_track(track_id)? {
                tracks.push(track);
            }
        }
        Ok(tracks)
    }

    fn seed_candidates(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>> {
        self.query_by_popularity(min_popularity, limit)
    }

    fn candidate_pool(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>> {
        self.query_by_popularity(min_popularity, limit)
    }

    fn search_by_name_prefix(&self, prefix_norm: &str, limit: usize) -> Result<Vec<Track>> {
        let upper_bound = format!("{}\u{f8ff}", prefix_norm);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM track \
             WHERE track_name_lowercase >= ?1 AND track_name_lowercase <= ?2 \
             ORDER BY track_name_lowercase LIMIT ?3",
            TRACK_COLUMNS
        ))?;
        let tracks = stmt
            .query_map(params![prefix_norm, upper_bound, limit], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }
}
