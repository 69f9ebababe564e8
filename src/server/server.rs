use anyhow::Result;
use std::time::Duration;

use tracing::{debug, error};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use super::state::*;
use crate::matching::{MatchError, MatchSession, SessionPhase, SessionStatus};
use crate::track_store::Track;

const SEARCH_LIMIT_MAX: usize = 50;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CreateSessionBody {
    pub username: String,
    pub seed_limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct SwipeBody {
    pub username: String,
    pub track_id: String,
    pub liked: bool,
}

#[derive(Deserialize, Debug)]
struct UsernameQuery {
    pub username: String,
}

#[derive(Deserialize, Debug)]
struct SearchQuery {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
    username: String,
    phase: SessionPhase,
    status: SessionStatus,
    seed_track_ids: Vec<String>,
}

impl SessionResponse {
    fn from_session(session: &MatchSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            username: session.username.clone(),
            phase: session.phase,
            status: session.status,
            seed_track_ids: session.seed_track_ids.clone(),
        }
    }
}

#[derive(Serialize)]
struct NextTrackResponse {
    track: Option<Track>,
    phase: SessionPhase,
    status: SessionStatus,
}

fn match_error_response(err: MatchError) -> Response {
    let status = match &err {
        MatchError::SessionNotFound(_)
        | MatchError::TrackNotFound(_)
        | MatchError::UserNotFound(_) => StatusCode::NOT_FOUND,
        MatchError::EmptyCandidatePool => StatusCode::SERVICE_UNAVAILABLE,
        MatchError::SessionCompleted(_) => StatusCode::CONFLICT,
        MatchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MatchError::Store(inner) => {
            error!("Store error: {:#}", inner);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn post_session(
    State(engine): State<GuardedMatchEngine>,
    Json(body): Json<CreateSessionBody>,
) -> Response {
    match engine.create_session(&body.username, body.seed_limit) {
        Ok(session) => (
            StatusCode::CREATED,
            Json(SessionResponse::from_session(&session)),
        )
            .into_response(),
        Err(err) => match_error_response(err),
    }
}

async fn post_swipe(
    State(engine): State<GuardedMatchEngine>,
    Path(session_id): Path<String>,
    Json(body): Json<SwipeBody>,
) -> Response {
    match engine.register_swipe(&body.username, &session_id, &body.track_id, body.liked) {
        Ok(session) => Json(session.summary()).into_response(),
        Err(err) => match_error_response(err),
    }
}

async fn get_next_track(
    State(engine): State<GuardedMatchEngine>,
    Path(session_id): Path<String>,
    Query(query): Query<UsernameQuery>,
) -> Response {
    match engine.get_next_track(&query.username, &session_id) {
        Ok((track, session)) => Json(NextTrackResponse {
            track,
            phase: session.phase,
            status: session.status,
        })
        .into_response(),
        Err(err) => match_error_response(err),
    }
}

async fn search_tracks(
    State(track_store): State<GuardedTrackStore>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let prefix = query.q.trim().to_lowercase();
    if prefix.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "query must not be empty" })),
        )
            .into_response();
    }
    let limit = query.limit.unwrap_or(20).min(SEARCH_LIMIT_MAX);
    match track_store.search_by_name_prefix(&prefix, limit) {
        Ok(tracks) => Json(tracks).into_response(),
        Err(err) => {
            error!("Track search failed: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_user_library(
    State(state): State<ServerState>,
    Path(username): Path<String>,
) -> Response {
    let username = username.trim().to_lowercase();
    let track_ids = match state.user_store.library_track_ids(&username) {
        Ok(ids) => ids,
        Err(err) => {
            error!("Library lookup failed for {}: {:#}", username, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    debug!("Library for {} has {} tracks", username, track_ids.len());
    match state.track_store.get_tracks(&track_ids) {
        Ok(tracks) => Json(tracks).into_response(),
        Err(err) => {
            error!("Library resolution failed for {}: {:#}", username, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let match_routes: Router = Router::new()
        .route("/sessions", post(post_session))
        .route("/sessions/{id}/swipes", post(post_swipe))
        .route("/sessions/{id}/next", get(get_next_track))
        .with_state(state.clone());

    let track_routes: Router = Router::new()
        .route("/search", get(search_tracks))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/{username}/library", get(get_user_library))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .with_state(state)
        .nest("/match", match_routes)
        .nest("/tracks", track_routes)
        .nest("/users", user_routes)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
