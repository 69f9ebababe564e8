use super::models::Track;
use anyhow::Result;

/// Trait for catalog track storage backends.
pub trait TrackStore: Send + Sync {
    /// Returns the track with the given id.
    /// Returns Ok(None) if the track does not exist.
    /// Returns Err if there is a database error.
    fn get_track(&self, track_id: &str) -> Result<Option<Track>>;

    /// Returns the tracks with the given ids, in the order of the input ids.
    /// Missing ids are silently skipped.
    fn get_tracks(&self, track_ids: &[String]) -> Result<Vec<Track>>;

    /// Returns up to `limit` tracks with popularity_norm >= `min_popularity`,
    /// most popular first. Used to build the diversified seed pool.
    fn seed_candidates(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>>;

    /// Returns up to `limit` tracks with popularity_norm >= `min_popularity`,
    /// most popular first. Same shape as `seed_candidates` but callers use a
    /// lower floor and a larger limit to get a broader pool.
    fn candidate_pool(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>>;

    /// Returns up to `limit` tracks whose lowercased name starts with
    /// `prefix_norm`, ordered by name. `prefix_norm` must already be
    /// lowercased by the caller.
    fn search_by_name_prefix(&self, prefix_norm: &str, limit: usize) -> Result<Vec<Track>>;
}
