//! SQLite-backed user store: profiles, swipe log, library, sessions.

use super::models::{FeatureSums, GenreCounts, UserProfile};
use super::trait_def::UserStore;
use crate::matching::{MatchSession, SessionPhase, SessionStatus, SwipeEvent};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// V 0
const USER_PROFILE_TABLE_V_0: Table = Table {
    name: "user_profile",
    columns: &[
        sqlite_column!("username", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_active", &SqlType::Integer, non_null = true),
        sqlite_column!("likes_count", &SqlType::Integer, non_null = true),
        sqlite_column!("dislikes_count", &SqlType::Integer, non_null = true),
        sqlite_column!("liked_genres", &SqlType::Text, non_null = true), // JSON pairs
        sqlite_column!("disliked_genres", &SqlType::Text, non_null = true), // JSON pairs
        sqlite_column!("feature_sums_liked", &SqlType::Text, non_null = true), // JSON object
        sqlite_column!("feature_sums_disliked", &SqlType::Text, non_null = true), // JSON object
    ],
    indices: &[],
    unique_constraints: &[],
};

const SWIPE_TABLE_V_0: Table = Table {
    name: "swipe",
    columns: &[
        sqlite_column!("swipe_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("session_id", &SqlType::Text, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("liked", &SqlType::Integer, non_null = true),
        sqlite_column!("phase", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_swipe_username", "username")],
    unique_constraints: &[],
};

const LIBRARY_TABLE_V_0: Table = Table {
    name: "library",
    columns: &[
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("source", &SqlType::Text, non_null = true),
        sqlite_column!(
            "added",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_library_username", "username")],
    unique_constraints: &[&["username", "track_id"]],
};

const MATCH_SESSION_TABLE_V_0: Table = Table {
    name: "match_session",
    columns: &[
        sqlite_column!("session_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("phase", &SqlType::Text, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("seed_track_ids", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("refined_track_ids", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("current_index", &SqlType::Integer, non_null = true),
        sqlite_column!("seed_swipes_completed", &SqlType::Integer, non_null = true),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!("updated", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_match_session_username", "username")],
    unique_constraints: &[],
};

const USER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_PROFILE_TABLE_V_0,
        SWIPE_TABLE_V_0,
        LIBRARY_TABLE_V_0,
        MATCH_SESSION_TABLE_V_0,
    ],
    migration: None,
}];

/// SQLite-backed implementation of [`UserStore`].
#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

fn timestamp(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn profile_from_row(row: &Row) -> rusqlite::Result<UserProfile> {
    let liked_genres_json: String = row.get(5)?;
    let disliked_genres_json: String = row.get(6)?;
    let sums_liked_json: String = row.get(7)?;
    let sums_disliked_json: String = row.get(8)?;
    Ok(UserProfile {
        username: row.get(0)?,
        created_at: datetime(row.get(1)?),
        last_active_at: datetime(row.get(2)?),
        likes_count: row.get(3)?,
        dislikes_count: row.get(4)?,
        liked_genres: serde_json::from_str(&liked_genres_json).unwrap_or_default(),
        disliked_genres: serde_json::from_str(&disliked_genres_json).unwrap_or_default(),
        feature_sums_liked: FeatureSums::from_json(
            &serde_json::from_str(&sums_liked_json).unwrap_or_default(),
        ),
        feature_sums_disliked: FeatureSums::from_json(
            &serde_json::from_str(&sums_disliked_json).unwrap_or_default(),
        ),
    })
}

fn session_from_row(row: &Row) -> rusqlite::Result<MatchSession> {
    let phase_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let seed_json: String = row.get(4)?;
    let refined_json: String = row.get(5)?;
    Ok(MatchSession {
        session_id: row.get(0)?,
        username: row.get(1)?,
        phase: SessionPhase::from_str(&phase_str).unwrap_or(SessionPhase::Seed),
        status: SessionStatus::from_str(&status_str).unwrap_or(SessionStatus::Active),
        seed_track_ids: serde_json::from_str(&seed_json).unwrap_or_default(),
        refined_track_ids: serde_json::from_str(&refined_json).unwrap_or_default(),
        current_index: row.get(6)?,
        seed_swipes_completed: row.get(7)?,
        created_at: datetime(row.get(8)?),
        updated_at: datetime(row.get(9)?),
    })
}

impl SqliteUserStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn =
            Connection::open(db_path.as_ref()).context("Failed to open user database")?;
        migrate_if_needed(&mut conn, USER_VERSIONED_SCHEMAS, "user")?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on user database")?;

        let users: usize =
            conn.query_row("SELECT COUNT(*) FROM user_profile", [], |r| r.get(0))?;
        info!("User store ready: {} profiles", users);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl UserStore for SqliteUserStore {
    fn get_profile(&self, username: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock().unwrap();
        let profile = conn
            .query_row(
                "SELECT username, created, last_active, likes_count, dislikes_count, \
                 liked_genres, disliked_genres, feature_sums_liked, feature_sums_disliked \
                 FROM user_profile WHERE username = ?1",
                params![username],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO user_profile (username, created, last_active, \
             likes_count, dislikes_count, liked_genres, disliked_genres, \
             feature_sums_liked, feature_sums_disliked) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                profile.username,
                timestamp(&profile.created_at),
                timestamp(&profile.last_active_at),
                profile.likes_count,
                profile.dislikes_count,
                serde_json::to_string(&profile.liked_genres)?,
                serde_json::to_string(&profile.disliked_genres)?,
                profile.feature_sums_liked.to_json().to_string(),
                profile.feature_sums_disliked.to_json().to_string(),
            ],
        )?;
        Ok(())
    }

    fn append_swipe_event(&self, username: &str, event: &SwipeEvent) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO swipe (swipe_id, username, session_id, track_id, liked, \
             phase, created) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.swipe_id,
                username,
                event.session_id,
                event.track_id,
                event.liked as i64,
                event.phase.as_str(),
                timestamp(&event.created_at),
            ],
        )?;
        if inserted == 0 {
            return Err(anyhow!("Swipe event {} already recorded", event.swipe_id));
        }
        Ok(())
    }

    fn swiped_track_ids(&self, username: &str) -> Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT DISTINCT track_id FROM swipe WHERE username = ?1")?;
        let ids = stmt
            .query_map(params![username], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    fn library_track_ids(&self, username: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT track_id FROM library WHERE username = ?1 ORDER BY rowid",
        )?;
        let ids = stmt
            .query_map(params![username], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn add_library_track(&self, username: &str, track_id: &str, source: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        // OR IGNORE makes the insert idempotent on (username, track_id)
        conn.execute(
            "INSERT OR IGNORE INTO library (username, track_id, source) VALUES (?1, ?2, ?3)",
            params![username, track_id, source],
        )?;
        Ok(())
    }

    fn get_session(&self, username: &str, session_id: &str) -> Result<Option<MatchSession>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT session_id, username, phase, status, seed_track_ids, \
                 refined_track_ids, current_index, seed_swipes_completed, created, updated \
                 FROM match_session WHERE session_id = ?1 AND username = ?2",
                params![session_id, username],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    fn save_session(&self, session: &MatchSession) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO match_session (session_id, username, phase, status, \
             seed_track_ids, refined_track_ids, current_index, seed_swipes_completed, \
             created, updated) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session.session_id,
                session.username,
                session.phase.as_str(),
                session.status.as_str(),
                serde_json::to_string(&session.seed_track_ids)?,
                serde_json::to_string(&session.refined_track_ids)?,
                session.current_index,
                session.seed_swipes_completed,
                timestamp(&session.created_at),
                timestamp(&session.updated_at),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_store::Track;

    fn open_store() -> (tempfile::TempDir, SqliteUserStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteUserStore::new(dir.path().join("users.db")).unwrap();
        (dir, store)
    }

    fn some_track(genre: &str) -> Track {
        Track {
            track_id: "t1".to_string(),
            track_name: "T".to_string(),
            artists: vec![],
            album_name: None,
            duration_ms: None,
            explicit: None,
            popularity_norm: Some(0.9),
            danceability: Some(0.7),
            energy: Some(0.5),
            acousticness: None,
            valence: Some(0.3),
            tempo_norm: Some(0.5),
            instrumentalness: None,
            liveness: None,
            speechiness: None,
            track_genre: Some(genre.to_string()),
            track_genre_group: None,
        }
    }

    #[test]
    fn test_ensure_profile_creates_once() {
        let (_dir, store) = open_store();
        assert!(store.get_profile("alice").unwrap().is_none());

        let created = store.ensure_profile("alice").unwrap();
        assert_eq!(created.likes_count, 0);

        let again = store.ensure_profile("alice").unwrap();
        assert_eq!(again.username, "alice");
        assert!(store.get_profile("alice").unwrap().is_some());
    }

    #[test]
    fn test_profile_round_trip_preserves_aggregates() {
        let (_dir, store) = open_store();
        let mut profile = UserProfile::new("alice");
        profile.apply_swipe(&some_track("pop"), true);
        profile.apply_swipe(&some_track("rock"), false);
        store.upsert_profile(&profile).unwrap();

        let loaded = store.get_profile("alice").unwrap().unwrap();
        assert_eq!(loaded.likes_count, 1);
        assert_eq!(loaded.dislikes_count, 1);
        assert_eq!(loaded.liked_genres, profile.liked_genres);
        assert_eq!(loaded.feature_sums_liked, profile.feature_sums_liked);
        assert_eq!(loaded.feature_sums_disliked, profile.feature_sums_disliked);
    }

    #[test]
    fn test_swipe_log_distinct_track_ids() {
        let (_dir, store) = open_store();
        let e1 = SwipeEvent::new("s1", "t1", true, SessionPhase::Seed);
        let e2 = SwipeEvent::new("s1", "t2", false, SessionPhase::Seed);
        let e3 = SwipeEvent::new("s2", "t1", true, SessionPhase::Refined);
        store.append_swipe_event("alice", &e1).unwrap();
        store.append_swipe_event("alice", &e2).unwrap();
        store.append_swipe_event("alice", &e3).unwrap();

        let ids = store.swiped_track_ids("alice").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("t1") && ids.contains("t2"));

        assert!(store.swiped_track_ids("bob").unwrap().is_empty());
    }

    #[test]
    fn test_library_insert_is_idempotent_and_ordered() {
        let (_dir, store) = open_store();
        store.add_library_track("alice", "t2", "swipe").unwrap();
        store.add_library_track("alice", "t1", "swipe").unwrap();
        store.add_library_track("alice", "t2", "manual").unwrap();

        let ids = store.library_track_ids("alice").unwrap();
        assert_eq!(ids, vec!["t2".to_string(), "t1".to_string()]);
    }

    #[test]
    fn test_session_round_trip() {
        let (_dir, store) = open_store();
        let mut session =
            MatchSession::new("alice", vec!["a".to_string(), "b".to_string()]);
        store.save_session(&session).unwrap();

        session.phase = SessionPhase::Refined;
        session.refined_track_ids = vec!["x".to_string()];
        session.current_index = 3;
        session.seed_swipes_completed = 3;
        store.save_session(&session).unwrap();

        let loaded = store
            .get_session("alice", &session.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.phase, SessionPhase::Refined);
        assert_eq!(loaded.refined_track_ids, vec!["x".to_string()]);
        assert_eq!(loaded.current_index, 3);
        assert_eq!(loaded.seed_swipes_completed, 3);

        // Wrong user never sees the session
        assert!(store
            .get_session("bob", &session.session_id)
            .unwrap()
            .is_none());
    }
}
