use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::models::{night::NightActionKind, player::PlayerId, session::Vote};
use crate::state::AppState;
use crate::utils::websocket;

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub player_id: PlayerId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyRequest {
    pub ready: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsRequest {
    pub killer_count: usize,
    pub action_time_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NightActionRequest {
    pub action: NightActionKind,
    pub target_id: PlayerId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub target: Vote,
}

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub player_id: Option<PlayerId>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:key",
            Router::new()
                // curl -X POST http://localhost:8080/api/session/global/join -d '{"name":"alice"}'
                .route("/join", post(join))
                // curl http://localhost:8080/api/session/global/state?player_id={id}
                .route("/state", get(get_state))
                // websocat ws://localhost:8080/api/session/global/ws?player_id={id}
                .route("/ws", get(websocket::handler))
                .nest(
                    "/players/:player_id",
                    Router::new()
                        .route("/ready", post(set_ready))
                        .route("/leave", post(leave))
                        .route("/settings", post(configure_settings))
                        .route("/night-action", post(submit_night_action))
                        .route("/vote", post(submit_vote))
                        .route("/reset", post(force_reset)),
                ),
        )
        .with_state(state)
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match self {
            GameError::NotAuthorized => StatusCode::FORBIDDEN,
            GameError::SessionNotFound(_) | GameError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
            GameError::GameInProgress | GameError::SessionFull => StatusCode::CONFLICT,
            GameError::InvalidConfiguration(_)
            | GameError::NotEligible(_)
            | GameError::InvalidName => StatusCode::BAD_REQUEST,
            GameError::SessionClosed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

async fn join(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<impl IntoResponse, GameError> {
    let player_id = state.join(&key, &req.name).await?;
    Ok((StatusCode::OK, Json(JoinResponse { player_id })))
}

async fn get_state(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<impl IntoResponse, GameError> {
    let snapshot = state.snapshot(&key, query.player_id.as_deref()).await?;
    Ok((StatusCode::OK, Json(snapshot)))
}

async fn set_ready(
    State(state): State<AppState>,
    Path((key, player_id)): Path<(String, String)>,
    Json(req): Json<ReadyRequest>,
) -> Result<impl IntoResponse, GameError> {
    state.set_ready(&key, &player_id, req.ready).await?;
    Ok(StatusCode::OK)
}

async fn leave(
    State(state): State<AppState>,
    Path((key, player_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, GameError> {
    state.leave(&key, &player_id).await?;
    Ok(StatusCode::OK)
}

async fn configure_settings(
    State(state): State<AppState>,
    Path((key, player_id)): Path<(String, String)>,
    Json(req): Json<SettingsRequest>,
) -> Result<impl IntoResponse, GameError> {
    let settings = state
        .configure_settings(&key, &player_id, req.killer_count, req.action_time_seconds)
        .await?;
    Ok((StatusCode::OK, Json(settings)))
}

async fn submit_night_action(
    State(state): State<AppState>,
    Path((key, player_id)): Path<(String, String)>,
    Json(req): Json<NightActionRequest>,
) -> Result<impl IntoResponse, GameError> {
    let submission = state
        .submit_night_action(&key, &player_id, req.action, &req.target_id)
        .await?;
    Ok((StatusCode::OK, Json(submission)))
}

async fn submit_vote(
    State(state): State<AppState>,
    Path((key, player_id)): Path<(String, String)>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, GameError> {
    let submission = state.submit_vote(&key, &player_id, req.target).await?;
    Ok((StatusCode::OK, Json(submission)))
}

async fn force_reset(
    State(state): State<AppState>,
    Path((key, player_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, GameError> {
    state.force_reset(&key, &player_id).await?;
    Ok(StatusCode::OK)
}
