mod engine;
mod error;
mod mixer;
mod preferences;
mod sampler;
mod scoring;
mod session;

pub use engine::MatchEngine;
pub use error::{MatchError, MatchResult};
pub use mixer::SessionMixer;
pub use preferences::{build_feature_preferences, library_top_genres, top_genres, FeaturePreferences};
pub use sampler::CandidateSampler;
pub use scoring::{feature_similarity, genre_weight_map, rank_candidates, score_track};
pub use session::{
    MatchSession, SessionPhase, SessionStatus, SessionSummary, SwipeEvent,
};
