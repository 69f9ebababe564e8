//! Candidate sampling against the track store.
//!
//! Seed sampling buckets by genre group and round-robins across buckets so a
//! new session sees a spread of genres instead of a popularity-sorted
//! monoculture. Refined-pool sampling prefers the user's top genres but
//! always leaves room for exploration picks.

use crate::config::MatchingSettings;
use crate::track_store::{Track, TrackStore};
use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub struct CandidateSampler {
    track_store: Arc<dyn TrackStore>,
    seed_popularity_floor: f64,
    seed_scan_limit: usize,
    candidate_popularity_floor: f64,
    candidate_scan_limit: usize,
}

impl CandidateSampler {
    pub fn new(track_store: Arc<dyn TrackStore>, settings: &MatchingSettings) -> Self {
        Self {
            track_store,
            seed_popularity_floor: settings.seed_popularity_floor,
            seed_scan_limit: settings.seed_scan_limit,
            candidate_popularity_floor: settings.candidate_popularity_floor,
            candidate_scan_limit: settings.candidate_scan_limit,
        }
    }

    /// Draws up to `limit` diversified seed tracks from the high-popularity
    /// pool, excluding `exclude_ids`.
    ///
    /// Candidates are bucketed by genre group (buckets keep first-seen
    /// order), shuffled within each bucket, then collected one per bucket
    /// per round until the limit is hit or every bucket is empty. No genre
    /// can dominate the seed set while others still have tracks left.
    pub fn seed_tracks<R: Rng>(
        &self,
        rng: &mut R,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Track>> {
        let pool = self
            .track_store
            .seed_candidates(self.seed_popularity_floor, self.seed_scan_limit)?;

        let mut buckets: Vec<(String, Vec<Track>)> = Vec::new();
        for track in pool {
            if exclude_ids.contains(&track.track_id) {
                continue;
            }
            let genre_key = track.genre_key().to_string();
            match buckets.iter_mut().find(|(key, _)| *key == genre_key) {
                Some((_, bucket)) => bucket.push(track),
                None => buckets.push((genre_key, vec![track])),
            }
        }

        for (_, bucket) in buckets.iter_mut() {
            bucket.shuffle(rng);
        }

        let mut selected: Vec<Track> = Vec::with_capacity(limit);
        while selected.len() < limit && !buckets.is_empty() {
            let mut bucket_index = 0;
            while bucket_index < buckets.len() && selected.len() < limit {
                match buckets[bucket_index].1.pop() {
                    Some(track) => {
                        selected.push(track);
                        bucket_index += 1;
                    }
                    None => {
                        buckets.remove(bucket_index);
                    }
                }
            }
            buckets.retain(|(_, bucket)| !bucket.is_empty());
        }

        debug!(
            "Sampled {} seed tracks from {} genre buckets",
            selected.len(),
            selected
                .iter()
                .map(|t| t.genre_key())
                .collect::<HashSet<_>>()
                .len()
        );
        Ok(selected)
    }

    /// Draws up to `limit` refined-phase candidates: on-genre tracks first,
    /// topped up with a random sample of everything else so the pool is
    /// never fully genre-locked.
    pub fn candidate_tracks<R: Rng>(
        &self,
        rng: &mut R,
        top_genres: &[String],
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Track>> {
        let pool = self
            .track_store
            .candidate_pool(self.candidate_popularity_floor, self.candidate_scan_limit)?;

        let mut on_genre: Vec<Track> = Vec::new();
        let mut exploration: Vec<Track> = Vec::new();
        for track in pool {
            if exclude_ids.contains(&track.track_id) {
                continue;
            }
            let is_on_genre = track
                .genre_tag()
                .map(|genre| top_genres.iter().any(|g| g == genre))
                .unwrap_or(false);
            if is_on_genre {
                on_genre.push(track);
            } else {
                exploration.push(track);
            }
            if on_genre.len() >= limit {
                break;
            }
        }

        if on_genre.len() < limit && !exploration.is_empty() {
            exploration.shuffle(rng);
            let missing = limit - on_genre.len();
            on_genre.extend(exploration.into_iter().take(missing));
        }

        debug!("Sampled {} candidate tracks", on_genre.len());
        Ok(on_genre)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    struct StaticTrackStore {
        tracks: Mutex<Vec<Track>>,
    }

    impl StaticTrackStore {
        fn new(tracks: Vec<Track>) -> Arc<Self> {
            Arc::new(Self {
                tracks: Mutex::new(tracks),
            })
        }
    }

    impl TrackStore for StaticTrackStore {
        fn get_track(&self, track_id: &str) -> Result<Option<Track>> {
            Ok(self
                .tracks
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.track_id == track_id)
                .cloned())
        }

        fn get_tracks(&self, track_ids: &[String]) -> Result<Vec<Track>> {
            let mut out = Vec::new();
            for id in track_ids {
                if let Some(t) = self.get_track(id)? {
                    out.push(t);
                }
            }
            Ok(out)
        }

        fn seed_candidates(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>> {
            self.candidate_pool(min_popularity, limit)
        }

        fn candidate_pool(&self, min_popularity: f64, limit: usize) -> Result<Vec<Track>> {
            let mut pool: Vec<Track> = self
                .tracks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.popularity_norm.unwrap_or(0.0) >= min_popularity)
                .cloned()
                .collect();
            pool.sort_by(|a, b| {
                b.popularity_norm
                    .unwrap_or(0.0)
                    .total_cmp(&a.popularity_norm.unwrap_or(0.0))
            });
            pool.truncate(limit);
            Ok(pool)
        }

        fn search_by_name_prefix(&self, _prefix: &str, _limit: usize) -> Result<Vec<Track>> {
            Ok(vec![])
        }
    }

    fn track(id: &str, genre: &str, popularity: f64) -> Track {
        Track {
            track_id: id.to_string(),
            track_name: id.to_string(),
            artists: vec![],
            album_name: None,
            duration_ms: None,
            explicit: None,
            popularity_norm: Some(popularity),
            danceability: None,
            energy: None,
            acousticness: None,
            valence: None,
            tempo_norm: None,
            instrumentalness: None,
            liveness: None,
            speechiness: None,
            track_genre: Some(genre.to_string()),
            track_genre_group: Some(genre.to_string()),
        }
    }

    fn sampler(tracks: Vec<Track>) -> CandidateSampler {
        CandidateSampler::new(StaticTrackStore::new(tracks), &MatchingSettings::default())
    }

    fn count_by_genre(tracks: &[Track]) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for t in tracks {
            let key = t.genre_key().to_string();
            match counts.iter_mut().find(|(g, _)| *g == key) {
                Some((_, c)) => *c += 1,
                None => counts.push((key, 1)),
            }
        }
        counts
    }

    #[test]
    fn test_seed_tracks_round_robin_across_two_genres() {
        // 2 genres, 3 popular tracks each; 3 seeds must span both genres
        let pool = vec![
            track("p1", "pop", 0.9),
            track("p2", "pop", 0.88),
            track("p3", "pop", 0.86),
            track("r1", "rock", 0.92),
            track("r2", "rock", 0.85),
            track("r3", "rock", 0.8),
        ];
        let s = sampler(pool);
        let mut rng = StdRng::seed_from_u64(7);

        let seeds = s.seed_tracks(&mut rng, &HashSet::new(), 3).unwrap();
        assert_eq!(seeds.len(), 3);
        let counts = count_by_genre(&seeds);
        assert_eq!(counts.len(), 2, "seeds should span both genres");
        assert!(counts.iter().all(|(_, c)| *c <= 2));
    }

    #[test]
    fn test_seed_tracks_respects_exclusions() {
        let pool = vec![
            track("a", "pop", 0.9),
            track("b", "pop", 0.9),
            track("c", "rock", 0.9),
        ];
        let s = sampler(pool);
        let mut rng = StdRng::seed_from_u64(1);
        let exclude: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();

        let seeds = s.seed_tracks(&mut rng, &exclude, 10).unwrap();
        let ids: Vec<&str> = seeds.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_seed_tracks_below_floor_are_ignored() {
        let pool = vec![track("a", "pop", 0.9), track("b", "pop", 0.2)];
        let s = sampler(pool);
        let mut rng = StdRng::seed_from_u64(1);

        let seeds = s.seed_tracks(&mut rng, &HashSet::new(), 10).unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].track_id, "a");
    }

    #[test]
    fn test_candidate_tracks_prefers_top_genres() {
        let pool = vec![
            track("m1", "metal", 0.95),
            track("p1", "pop", 0.9),
            track("p2", "pop", 0.85),
            track("j1", "jazz", 0.8),
        ];
        let s = sampler(pool);
        let mut rng = StdRng::seed_from_u64(3);
        let top = vec!["pop".to_string()];

        let candidates = s
            .candidate_tracks(&mut rng, &top, &HashSet::new(), 2)
            .unwrap();
        let ids: Vec<&str> = candidates.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_candidate_tracks_tops_up_with_exploration() {
        let pool = vec![
            track("p1", "pop", 0.9),
            track("m1", "metal", 0.85),
            track("j1", "jazz", 0.8),
        ];
        let s = sampler(pool);
        let mut rng = StdRng::seed_from_u64(3);
        let top = vec!["pop".to_string()];

        let candidates = s
            .candidate_tracks(&mut rng, &top, &HashSet::new(), 3)
            .unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].track_id, "p1");
        // the remaining two are exploration picks in some shuffled order
        let rest: HashSet<&str> = candidates[1..].iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(rest, ["m1", "j1"].into_iter().collect());
    }

    #[test]
    fn test_candidate_tracks_never_returns_excluded() {
        let pool = vec![
            track("p1", "pop", 0.9),
            track("p2", "pop", 0.85),
            track("m1", "metal", 0.8),
        ];
        let s = sampler(pool);
        let mut rng = StdRng::seed_from_u64(3);
        let exclude: HashSet<String> = ["p1", "m1"].iter().map(|s| s.to_string()).collect();

        let candidates = s
            .candidate_tracks(&mut rng, &["pop".to_string()], &exclude, 10)
            .unwrap();
        let ids: Vec<&str> = candidates.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["p2"]);
    }
}
