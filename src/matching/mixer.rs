//! Probabilistic blending of the seed and refined lists once a session is
//! in refined phase.

use super::session::MatchSession;
use rand::Rng;
use std::collections::HashSet;

pub struct SessionMixer {
    /// Probability of preferring the seed list when both lists have tracks.
    seed_share: f64,
}

impl SessionMixer {
    pub fn new(seed_share: f64) -> Self {
        Self { seed_share }
    }

    /// Picks the next servable track id, advancing the session cursor past
    /// it. Returns None when neither list has an unserved, non-excluded
    /// track left; the caller then completes the session.
    ///
    /// The preferred list is scanned from the cursor position (wrapping, at
    /// most one full pass); if it yields nothing the other list gets one
    /// scan too. The cursor itself only ever grows.
    pub fn next_track_id<R: Rng>(
        &self,
        rng: &mut R,
        session: &mut MatchSession,
        exclude_ids: &HashSet<String>,
    ) -> Option<String> {
        let mut seed_usable = !session.seed_track_ids.is_empty();
        let mut refined_usable = !session.refined_track_ids.is_empty();

        // Two attempts: the preferred list, then the other one.
        for _ in 0..2 {
            let use_seed = match (seed_usable, refined_usable) {
                (false, false) => return None,
                (true, false) => true,
                (false, true) => false,
                (true, true) => rng.random_bool(self.seed_share),
            };

            let ids = if use_seed {
                &session.seed_track_ids
            } else {
                &session.refined_track_ids
            };

            let start = session.current_index % ids.len();
            let mut found: Option<(usize, String)> = None;
            for offset in 0..ids.len() {
                let id = &ids[(start + offset) % ids.len()];
                if !exclude_ids.contains(id) {
                    found = Some((offset, id.clone()));
                    break;
                }
            }

            if let Some((offset, id)) = found {
                session.current_index += offset + 1;
                return Some(id);
            }

            if use_seed {
                seed_usable = false;
            } else {
                refined_usable = false;
            }
        }

        None
    }
}
