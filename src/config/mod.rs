mod file_config;

pub use file_config::{FileConfig, MatchingConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that participate in config resolution. Mirrors the CLI
/// surface so TOML values can override it field by field.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub track_db: Option<PathBuf>,
    pub user_db: Option<PathBuf>,
    pub port: u16,
}

/// Tunables for the match-session engine. The floors and pool sizes are
/// deliberately configuration, not behavior: any combination keeping the
/// documented ratios is valid.
#[derive(Debug, Clone)]
pub struct MatchingSettings {
    /// Default number of seed tracks per new session.
    pub seed_limit: usize,
    /// Seed swipes required before the session refines (or the whole seed
    /// pool if it is smaller).
    pub seed_swipe_threshold: usize,
    /// Minimum popularity_norm for the seed pool.
    pub seed_popularity_floor: f64,
    /// How many popular tracks to scan when building the seed pool.
    pub seed_scan_limit: usize,
    /// Minimum popularity_norm for the refined candidate pool.
    pub candidate_popularity_floor: f64,
    /// How many tracks to scan when building the refined candidate pool.
    pub candidate_scan_limit: usize,
    /// Maximum candidates fed into scoring.
    pub candidate_limit: usize,
    /// Maximum size of the refined track list kept on the session.
    pub refined_limit: usize,
    /// Probability of serving from the seed list in refined phase (~2/3).
    pub seed_share: f64,
    /// Number of top genres used for candidate filtering and scoring.
    pub top_genres_limit: usize,
    /// Genres assumed when a user has no usable signal at all.
    pub default_genres: Vec<String>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            seed_limit: 12,
            seed_swipe_threshold: 3,
            seed_popularity_floor: 0.75,
            seed_scan_limit: 400,
            candidate_popularity_floor: 0.6,
            candidate_scan_limit: 800,
            candidate_limit: 300,
            refined_limit: 200,
            seed_share: 2.0 / 3.0,
            top_genres_limit: 3,
            default_genres: vec![
                "pop".to_string(),
                "rock".to_string(),
                "hip hop".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub track_db: PathBuf,
    pub user_db: PathBuf,
    pub port: u16,
    pub matching: MatchingSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let track_db = file
            .track_db
            .map(PathBuf::from)
            .or_else(|| cli.track_db.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("track_db must be specified as an argument or in the config file")
            })?;
        let user_db = file
            .user_db
            .map(PathBuf::from)
            .or_else(|| cli.user_db.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("user_db must be specified as an argument or in the config file")
            })?;

        let port = file.port.unwrap_or(cli.port);

        let m_file = file.matching.unwrap_or_default();
        let defaults = MatchingSettings::default();
        let matching = MatchingSettings {
            seed_limit: m_file.seed_limit.unwrap_or(defaults.seed_limit),
            seed_swipe_threshold: m_file
                .seed_swipe_threshold
                .unwrap_or(defaults.seed_swipe_threshold),
            seed_popularity_floor: m_file
                .seed_popularity_floor
                .unwrap_or(defaults.seed_popularity_floor),
            seed_scan_limit: m_file.seed_scan_limit.unwrap_or(defaults.seed_scan_limit),
            candidate_popularity_floor: m_file
                .candidate_popularity_floor
                .unwrap_or(defaults.candidate_popularity_floor),
            candidate_scan_limit: m_file
                .candidate_scan_limit
                .unwrap_or(defaults.candidate_scan_limit),
            candidate_limit: m_file.candidate_limit.unwrap_or(defaults.candidate_limit),
            refined_limit: m_file.refined_limit.unwrap_or(defaults.refined_limit),
            seed_share: m_file.seed_share.unwrap_or(defaults.seed_share),
            top_genres_limit: m_file
                .top_genres_limit
                .unwrap_or(defaults.top_genres_limit),
            default_genres: m_file.default_genres.unwrap_or(defaults.default_genres),
        };

        if !(0.0..=1.0).contains(&matching.seed_share) {
            bail!(
                "matching.seed_share must be in [0,1], got {}",
                matching.seed_share
            );
        }
        if matching.seed_swipe_threshold == 0 {
            bail!("matching.seed_swipe_threshold must be at least 1");
        }

        Ok(Self {
            track_db,
            user_db,
            port,
            matching,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliConfig {
        CliConfig {
            track_db: Some(PathBuf::from("/tmp/tracks.db")),
            user_db: Some(PathBuf::from("/tmp/users.db")),
            port: 3002,
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let config = AppConfig::resolve(&cli(), None).unwrap();
        assert_eq!(config.port, 3002);
        assert_eq!(config.matching.seed_swipe_threshold, 3);
        assert_eq!(config.matching.refined_limit, 200);
    }

    #[test]
    fn test_toml_overrides_cli() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 8080

            [matching]
            seed_limit = 5
            seed_share = 0.5
            "#,
        )
        .unwrap();
        let config = AppConfig::resolve(&cli(), Some(file)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.matching.seed_limit, 5);
        assert_eq!(config.matching.seed_share, 0.5);
        // untouched fields keep defaults
        assert_eq!(config.matching.candidate_limit, 300);
    }

    #[test]
    fn test_invalid_seed_share_rejected() {
        let file: FileConfig = toml::from_str("[matching]\nseed_share = 1.5\n").unwrap();
        assert!(AppConfig::resolve(&cli(), Some(file)).is_err());
    }

    #[test]
    fn test_missing_db_path_rejected() {
        let cli = CliConfig {
            track_db: None,
            user_db: None,
            port: 3002,
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }
}
