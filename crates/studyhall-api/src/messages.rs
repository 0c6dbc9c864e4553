use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use studyhall_types::api::{Claims, SendMessageRequest};

use crate::AppState;
use crate::groups::status_for;

pub async fn send_message(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let gateway = state.gateway.clone();
    let email = claims.email.clone();

    let sent = tokio::task::spawn_blocking(move || {
        gateway.send_message(group_id, claims.sub, &email, &req.text)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| status_for(&e))?;

    // blank text is a silent no-op, not an error
    match sent {
        Some(message) => Ok((StatusCode::CREATED, Json(message)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();

    let messages =
        tokio::task::spawn_blocking(move || studyhall_engine::views::load_messages(&db, group_id))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .map_err(|e| {
                error!("failed to load messages: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

    Ok(Json(messages))
}
