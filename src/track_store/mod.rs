mod models;
mod sqlite_track_store;
mod trait_def;

pub use models::{AudioFeature, Track};
pub use sqlite_track_store::SqliteTrackStore;
pub use trait_def::TrackStore;
