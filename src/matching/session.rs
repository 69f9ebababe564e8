use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase of a match session.
///
/// Seed is the initial phase, serving a diversified popularity-biased list.
/// Once enough swipe signal exists the session moves to Refined and never
/// goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Seed,
    Refined,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Seed => "seed",
            SessionPhase::Refined => "refined",
        }
    }

    pub fn from_str(s: &str) -> Option<SessionPhase> {
        match s {
            "seed" => Some(SessionPhase::Seed),
            "refined" => Some(SessionPhase::Refined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<SessionStatus> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// One discovery session for one user.
///
/// Mutated on every swipe and next-track call, persisted through the user
/// store after each mutation. Never deleted here; retention is someone
/// else's problem.
#[derive(Debug, Clone)]
pub struct MatchSession {
    pub session_id: String,
    pub username: String,
    pub phase: SessionPhase,
    pub status: SessionStatus,
    pub seed_track_ids: Vec<String>,
    pub refined_track_ids: Vec<String>,
    /// Serving cursor. Monotonic within a phase; reset on phase transition.
    pub current_index: usize,
    pub seed_swipes_completed: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchSession {
    pub fn new(username: &str, seed_track_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            phase: SessionPhase::Seed,
            status: SessionStatus::Active,
            seed_track_ids,
            refined_track_ids: Vec::new(),
            current_index: 0,
            seed_swipes_completed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            username: self.username.clone(),
            phase: self.phase,
            status: self.status,
            seed_count: self.seed_track_ids.len(),
            refined_count: self.refined_track_ids.len(),
            seed_swipes_completed: self.seed_swipes_completed,
        }
    }
}

/// JSON-safe view of a session returned to the calling layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub username: String,
    pub phase: SessionPhase,
    pub status: SessionStatus,
    pub seed_count: usize,
    pub refined_count: usize,
    pub seed_swipes_completed: usize,
}

/// Append-only record of a single swipe. Written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeEvent {
    pub swipe_id: String,
    pub session_id: String,
    pub track_id: String,
    pub liked: bool,
    /// Session phase at the time of the swipe.
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
}

impl SwipeEvent {
    pub fn new(session_id: &str, track_id: &str, liked: bool, phase: SessionPhase) -> Self {
        Self {
            swipe_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            track_id: track_id.to_string(),
            liked,
            phase,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = MatchSession::new("alice", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(session.phase, SessionPhase::Seed);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.seed_swipes_completed, 0);
        assert!(session.refined_track_ids.is_empty());
        assert!(!session.session_id.is_empty());
    }

    #[test]
    fn test_phase_and_status_round_trip() {
        for phase in [SessionPhase::Seed, SessionPhase::Refined] {
            assert_eq!(SessionPhase::from_str(phase.as_str()), Some(phase));
        }
        for status in [SessionStatus::Active, SessionStatus::Completed] {
            assert_eq!(SessionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(SessionPhase::from_str("nope"), None);
    }
}
