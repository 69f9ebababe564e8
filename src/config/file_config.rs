use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub track_db: Option<String>,
    pub user_db: Option<String>,
    pub port: Option<u16>,

    // Engine tunables
    pub matching: Option<MatchingConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    pub seed_limit: Option<usize>,
    pub seed_swipe_threshold: Option<usize>,
    pub seed_popularity_floor: Option<f64>,
    pub seed_scan_limit: Option<usize>,
    pub candidate_popularity_floor: Option<f64>,
    pub candidate_scan_limit: Option<usize>,
    pub candidate_limit: Option<usize>,
    pub refined_limit: Option<usize>,
    pub seed_share: Option<f64>,
    pub top_genres_limit: Option<usize>,
    pub default_genres: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
