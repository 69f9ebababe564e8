use axum::extract::FromRef;

use crate::matching::MatchEngine;
use crate::track_store::TrackStore;
use crate::user_store::UserStore;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedMatchEngine = Arc<MatchEngine>;
pub type GuardedTrackStore = Arc<dyn TrackStore>;
pub type GuardedUserStore = Arc<dyn UserStore>;

#[derive(Clone)]
pub struct ServerState {
    pub start_time: Instant,
    pub engine: GuardedMatchEngine,
    pub track_store: GuardedTrackStore,
    pub user_store: GuardedUserStore,
}

impl ServerState {
    pub fn new(
        engine: GuardedMatchEngine,
        track_store: GuardedTrackStore,
        user_store: GuardedUserStore,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            engine,
            track_store,
            user_store,
        }
    }
}

impl FromRef<ServerState> for GuardedMatchEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.engine.clone()
    }
}

impl FromRef<ServerState> for GuardedTrackStore {
    fn from_ref(input: &ServerState) -> Self {
        input.track_store.clone()
    }
}

impl FromRef<ServerState> for GuardedUserStore {
    fn from_ref(input: &ServerState) -> Self {
        input.user_store.clone()
    }
}
