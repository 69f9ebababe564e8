use super::models::UserProfile;
use crate::matching::{MatchSession, SwipeEvent};
use anyhow::Result;
use std::collections::HashSet;

/// Trait for user-side storage: profiles, the swipe log, the library and
/// session documents. All usernames are expected pre-normalized (lowercase)
/// by the caller.
pub trait UserStore: Send + Sync {
    /// Returns the user's profile.
    /// Returns Ok(None) if the user does not exist.
    /// Returns Err if there is a database error.
    fn get_profile(&self, username: &str) -> Result<Option<UserProfile>>;

    /// Inserts or fully replaces the user's profile.
    fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Returns the user's profile, creating and persisting a fresh one if
    /// the user was never seen before.
    fn ensure_profile(&self, username: &str) -> Result<UserProfile> {
        if let Some(profile) = self.get_profile(username)? {
            return Ok(profile);
        }
        let profile = UserProfile::new(username);
        self.upsert_profile(&profile)?;
        Ok(profile)
    }

    /// Appends a swipe event to the user's swipe log. Write-once.
    fn append_swipe_event(&self, username: &str, event: &SwipeEvent) -> Result<()>;

    /// Returns the distinct track ids the user has ever swiped on.
    fn swiped_track_ids(&self, username: &str) -> Result<HashSet<String>>;

    /// Returns the user's library track ids in insertion order.
    fn library_track_ids(&self, username: &str) -> Result<Vec<String>>;

    /// Adds a track to the user's library. Idempotent: adding an
    /// already-present track id is not an error.
    fn add_library_track(&self, username: &str, track_id: &str, source: &str) -> Result<()>;

    /// Returns the session with the given id for the given user.
    /// Returns Ok(None) if it does not exist.
    fn get_session(&self, username: &str, session_id: &str) -> Result<Option<MatchSession>>;

    /// Inserts or fully replaces a session document.
    fn save_session(&self, session: &MatchSession) -> Result<()>;
}
