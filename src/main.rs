use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trackmatch_server::config::{AppConfig, CliConfig, FileConfig};
use trackmatch_server::matching::MatchEngine;
use trackmatch_server::server::{run_server, ServerState};
use trackmatch_server::track_store::SqliteTrackStore;
use trackmatch_server::user_store::SqliteUserStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite track catalog database file.
    #[clap(value_parser = parse_path)]
    pub track_db: Option<PathBuf>,

    /// Path to the SQLite database file to use for user storage.
    #[clap(value_parser = parse_path)]
    pub user_db: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3002)]
    pub port: u16,

    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to a JSON track dump to import into the track database on startup.
    #[clap(long, value_parser = parse_path)]
    pub import_tracks: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .init();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        track_db: cli_args.track_db.clone(),
        user_db: cli_args.user_db.clone(),
        port: cli_args.port,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening SQLite track database at {:?}...", config.track_db);
    let track_store = Arc::new(SqliteTrackStore::new(&config.track_db)?);

    if let Some(dump_path) = &cli_args.import_tracks {
        info!("Importing tracks from {:?}...", dump_path);
        let imported = track_store.load_tracks_json(dump_path)?;
        info!("Imported {} tracks", imported);
    }

    info!("Opening SQLite user database at {:?}...", config.user_db);
    let user_store = Arc::new(SqliteUserStore::new(&config.user_db)?);

    let engine = Arc::new(MatchEngine::new(
        track_store.clone(),
        user_store.clone(),
        config.matching.clone(),
    ));
    let state = ServerState::new(engine, track_store, user_store);

    info!("Ready to serve at port {}!", config.port);
    run_server(state, config.port).await
}
