use crate::AppState;
use crate::error::AppError;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_macros::debug_handler;
use lihabot_core::{QueueRef, Snapshot};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub(crate) struct LengthResponse {
    length: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PositionResponse {
    position: usize,
    queue_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    tank: Option<String>,
}

#[debug_handler]
pub(crate) async fn status(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.queue.snapshot().await)
}

pub(crate) async fn shared_length(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let length = state.queue.length(&QueueRef::Shared).await?;
    Ok(Json(LengthResponse { length }))
}

pub(crate) async fn tank_length(
    State(state): State<Arc<AppState>>,
    Path(tank): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let length = state.queue.length(&QueueRef::Tank(tank)).await?;
    Ok(Json(LengthResponse { length }))
}

pub(crate) async fn position(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let found = state
        .queue
        .position_anywhere(&player_id)
        .await
        .ok_or(AppError::PlayerNotQueued)?;

    Ok(Json(PositionResponse {
        position: found.position,
        queue_length: found.queue_length,
        tank: found.tank.map(|t| t.display_name),
    }))
}
