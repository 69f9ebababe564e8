//! The match-session state machine.
//!
//! Owns session lifecycle: creation in seed phase, swipe registration with
//! preference-model updates, the one-way transition to refined phase, and
//! next-track selection. All session reads go through the user store; every
//! mutation is a read-modify-write serialized by a per-(user, session) lock.

use super::error::{MatchError, MatchResult};
use super::mixer::SessionMixer;
use super::sampler::CandidateSampler;
use super::session::{MatchSession, SessionPhase, SessionStatus, SwipeEvent};
use super::{preferences, scoring};
use crate::config::MatchingSettings;
use crate::track_store::{Track, TrackStore};
use crate::user_store::UserStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct MatchEngine {
    track_store: Arc<dyn TrackStore>,
    user_store: Arc<dyn UserStore>,
    sampler: CandidateSampler,
    mixer: SessionMixer,
    settings: MatchingSettings,
    rng: Mutex<StdRng>,
    /// One lock per (username, session_id); serializes read-modify-write
    /// cycles so cursors and counters never lose updates under concurrency.
    session_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl MatchEngine {
    pub fn new(
        track_store: Arc<dyn TrackStore>,
        user_store: Arc<dyn UserStore>,
        settings: MatchingSettings,
    ) -> Self {
        Self::with_rng(track_store, user_store, settings, StdRng::from_os_rng())
    }

    /// Same as [`MatchEngine::new`] but with a caller-provided generator,
    /// so tests get deterministic sampling and mixing.
    pub fn with_rng(
        track_store: Arc<dyn TrackStore>,
        user_store: Arc<dyn UserStore>,
        settings: MatchingSettings,
        rng: StdRng,
    ) -> Self {
        let sampler = CandidateSampler::new(Arc::clone(&track_store), &settings);
        let mixer = SessionMixer::new(settings.seed_share);
        Self {
            track_store,
            user_store,
            sampler,
            mixer,
            settings,
            rng: Mutex::new(rng),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &MatchingSettings {
        &self.settings
    }

    /// Starts a new discovery session in seed phase.
    ///
    /// Ensures the user profile exists, excludes the user's library from the
    /// seed draw and persists the new session before returning it.
    pub fn create_session(
        &self,
        username: &str,
        seed_limit: Option<usize>,
    ) -> MatchResult<MatchSession> {
        let username = normalize_username(username)?;
        let seed_limit = seed_limit.unwrap_or(self.settings.seed_limit);
        if seed_limit == 0 {
            return Err(MatchError::InvalidInput(
                "seed_limit must be at least 1".to_string(),
            ));
        }

        self.user_store.ensure_profile(&username)?;

        // Never re-offer tracks the user already saved
        let exclude_ids: HashSet<String> = self
            .user_store
            .library_track_ids(&username)?
            .into_iter()
            .collect();

        let seed_tracks = {
            let mut rng = self.rng.lock().unwrap();
            self.sampler.seed_tracks(&mut *rng, &exclude_ids, seed_limit)?
        };
        if seed_tracks.is_empty() {
            return Err(MatchError::EmptyCandidatePool);
        }

        let seed_ids: Vec<String> = seed_tracks.into_iter().map(|t| t.track_id).collect();
        let session = MatchSession::new(&username, seed_ids);
        self.user_store.save_session(&session)?;

        info!(
            "Created session {} for {} with {} seeds",
            session.session_id,
            username,
            session.seed_track_ids.len()
        );
        Ok(session)
    }

    /// Registers one swipe: appends the event, folds it into the preference
    /// aggregates, adds liked tracks to the library and evaluates the phase
    /// transition. The updated session is persisted and returned.
    pub fn register_swipe(
        &self,
        username: &str,
        session_id: &str,
        track_id: &str,
        liked: bool,
    ) -> MatchResult<MatchSession> {
        let username = normalize_username(username)?;
        let lock = self.session_lock(&username, session_id);
        let _guard = lock.lock().unwrap();

        // Validate everything before touching any document
        let mut session = self.load_session(&username, session_id)?;
        if session.status == SessionStatus::Completed {
            return Err(MatchError::SessionCompleted(session_id.to_string()));
        }
        let track = self
            .track_store
            .get_track(track_id)?
            .ok_or_else(|| MatchError::TrackNotFound(track_id.to_string()))?;

        let event = SwipeEvent::new(session_id, track_id, liked, session.phase);
        self.user_store.append_swipe_event(&username, &event)?;

        let mut profile = self.user_store.ensure_profile(&username)?;
        profile.apply_swipe(&track, liked);
        self.user_store.upsert_profile(&profile)?;

        if liked {
            self.user_store
                .add_library_track(&username, track_id, "swipe")?;
        }

        if session.phase == SessionPhase::Seed {
            session.seed_swipes_completed += 1;
        }
        session.touch();
        self.user_store.save_session(&session)?;

        if self.should_refine(&session) {
            self.refine_session(&mut session)?;
        }

        debug!(
            "Swipe registered for {} on {} (liked: {}), session {} now {:?}/{:?}",
            username, track_id, liked, session_id, session.phase, session.status
        );
        Ok(session)
    }

    /// Serves the next track for the session, or None once every track in
    /// both pools is excluded (which completes the session).
    pub fn get_next_track(
        &self,
        username: &str,
        session_id: &str,
    ) -> MatchResult<(Option<Track>, MatchSession)> {
        let username = normalize_username(username)?;
        let lock = self.session_lock(&username, session_id);
        let _guard = lock.lock().unwrap();

        let mut session = self.load_session(&username, session_id)?;
        if session.status == SessionStatus::Completed {
            return Ok((None, session));
        }

        let library_ids = self.user_store.library_track_ids(&username)?;
        let mut exclude_ids: HashSet<String> = self.user_store.swiped_track_ids(&username)?;
        exclude_ids.extend(library_ids);

        // Bounded transition-then-retry: at most one transition per call,
        // and the refined branch always resolves.
        let mut transitions = 0;
        loop {
            if session.phase == SessionPhase::Seed && !self.should_refine(&session) {
                if let Some(track) = self.next_seed_track(&mut session, &exclude_ids)? {
                    session.touch();
                    self.user_store.save_session(&session)?;
                    return Ok((Some(track), session));
                }
                // Seed list exhausted before the swipe threshold: treat it
                // as satisfying the predicate and refine anyway.
                self.refine_session(&mut session)?;
            } else if session.phase == SessionPhase::Seed {
                self.refine_session(&mut session)?;
            } else {
                let picked = loop {
                    let picked = {
                        let mut rng = self.rng.lock().unwrap();
                        self.mixer
                            .next_track_id(&mut *rng, &mut session, &exclude_ids)
                    };
                    match picked {
                        Some(track_id) => {
                            if let Some(track) = self.track_store.get_track(&track_id)? {
                                break Some(track);
                            }
                            // Dangling id (track dropped from the catalog):
                            // exclude it and keep scanning.
                            exclude_ids.insert(track_id);
                        }
                        None => break None,
                    }
                };

                return match picked {
                    Some(track) => {
                        session.touch();
                        self.user_store.save_session(&session)?;
                        Ok((Some(track), session))
                    }
                    None => {
                        session.status = SessionStatus::Completed;
                        session.touch();
                        self.user_store.save_session(&session)?;
                        info!("Session {} completed, both pools exhausted", session_id);
                        Ok((None, session))
                    }
                };
            }

            transitions += 1;
            if transitions > 1 {
                // Cannot happen: refine_session always lands in refined
                // phase, which always returns above.
                session.status = SessionStatus::Completed;
                session.touch();
                self.user_store.save_session(&session)?;
                return Ok((None, session));
            }
        }
    }

    // ---------- helpers ----------

    fn session_lock(&self, username: &str, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().unwrap();
        locks
            .entry((username.to_string(), session_id.to_string()))
            .or_default()
            .clone()
    }

    fn load_session(&self, username: &str, session_id: &str) -> MatchResult<MatchSession> {
        self.user_store
            .get_session(username, session_id)?
            .ok_or_else(|| MatchError::SessionNotFound(session_id.to_string()))
    }

    /// The refinement predicate: enough seed swipes relative to the seed
    /// pool size. Only meaningful in seed phase.
    fn should_refine(&self, session: &MatchSession) -> bool {
        if session.phase != SessionPhase::Seed || session.seed_track_ids.is_empty() {
            return false;
        }
        let threshold = self
            .settings
            .seed_swipe_threshold
            .min(session.seed_track_ids.len());
        session.seed_swipes_completed >= threshold
    }

    /// Serves the next seed track strictly in list order, skipping excluded
    /// ids and advancing the cursor past them. Returns None when the seed
    /// list is exhausted.
    fn next_seed_track(
        &self,
        session: &mut MatchSession,
        exclude_ids: &HashSet<String>,
    ) -> MatchResult<Option<Track>> {
        while session.current_index < session.seed_track_ids.len() {
            let track_id = session.seed_track_ids[session.current_index].clone();
            session.current_index += 1;

            if exclude_ids.contains(&track_id) {
                continue;
            }
            match self.track_store.get_track(&track_id)? {
                Some(track) => return Ok(Some(track)),
                None => continue,
            }
        }
        Ok(None)
    }

    /// Builds the refined pool and moves the session to refined phase.
    ///
    /// Top genres come from the profile aggregates, falling back to the
    /// library's genres and finally to the configured defaults, so a
    /// fresh-ish user still gets a usable pool.
    fn refine_session(&self, session: &mut MatchSession) -> MatchResult<()> {
        let username = session.username.clone();
        let profile = self.user_store.ensure_profile(&username)?;

        let mut top_genres = preferences::top_genres(&profile, self.settings.top_genres_limit);
        if top_genres.is_empty() {
            let library_ids = self.user_store.library_track_ids(&username)?;
            let library_tracks = self.track_store.get_tracks(&library_ids)?;
            top_genres =
                preferences::library_top_genres(&library_tracks, self.settings.top_genres_limit);
        }
        if top_genres.is_empty() {
            top_genres = self.settings.default_genres.clone();
        }

        let feature_preferences = preferences::build_feature_preferences(&profile);
        let genre_weights = scoring::genre_weight_map(&top_genres);

        let mut exclude_ids: HashSet<String> = self.user_store.swiped_track_ids(&username)?;
        exclude_ids.extend(self.user_store.library_track_ids(&username)?);

        let candidates = {
            let mut rng = self.rng.lock().unwrap();
            self.sampler.candidate_tracks(
                &mut *rng,
                &top_genres,
                &exclude_ids,
                self.settings.candidate_limit,
            )?
        };
        let refined_ids = scoring::rank_candidates(
            &candidates,
            &feature_preferences,
            &genre_weights,
            self.settings.refined_limit,
        );

        info!(
            "Session {} refined: {} candidates scored, {} kept, top genres {:?}",
            session.session_id,
            candidates.len(),
            refined_ids.len(),
            top_genres
        );

        session.refined_track_ids = refined_ids;
        session.phase = SessionPhase::Refined;
        session.current_index = 0;
        session.touch();
        self.user_store.save_session(&session)?;
        Ok(())
    }
}

fn normalize_username(username: &str) -> MatchResult<String> {
    let normalized = username.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(MatchError::InvalidInput(
            "username must not be empty".to_string(),
        ));
    }
    Ok(normalized)
}
