mod models;
mod sqlite_user_store;
mod trait_def;

pub use models::{FeatureSums, GenreCounts, UserProfile};
pub use sqlite_user_store::SqliteUserStore;
pub use trait_def::UserStore;
