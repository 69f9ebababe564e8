use thiserror::Error;

/// Errors surfaced by the match-session engine.
///
/// Store-layer faults propagate unchanged through the `Store` variant; the
/// engine never retries or suppresses them.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Track {0} not found")]
    TrackNotFound(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("No candidate tracks available")]
    EmptyCandidatePool,

    #[error("Session {0} is already completed")]
    SessionCompleted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type MatchResult<T> = Result<T, MatchError>;
