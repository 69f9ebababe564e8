//! Trackmatch Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod matching;
pub mod server;
pub mod sqlite_persistence;
pub mod track_store;
pub mod user_store;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig, MatchingSettings};
pub use matching::{MatchEngine, MatchError, MatchResult};
pub use server::{make_app, run_server, ServerState};
pub use track_store::{SqliteTrackStore, TrackStore};
pub use user_store::{SqliteUserStore, UserStore};
