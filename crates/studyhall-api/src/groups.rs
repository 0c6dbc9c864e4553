use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use studyhall_engine::GatewayError;
use studyhall_types::api::{Claims, CreateGroupRequest};

use crate::AppState;

pub(crate) fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::NotFound => StatusCode::NOT_FOUND,
        GatewayError::Store(e) => {
            error!("store error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Run blocking DB work off the async runtime
    let gateway = state.gateway.clone();
    let email = claims.email.clone();

    let group = tokio::task::spawn_blocking(move || gateway.create_group(&email, &req))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| status_for(&e))?;

    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let groups = tokio::task::spawn_blocking(move || studyhall_engine::views::load_all_groups(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("failed to load groups: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(groups))
}

pub async fn join_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let gateway = state.gateway.clone();

    tokio::task::spawn_blocking(move || gateway.join_group(claims.sub, group_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| status_for(&e))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn joined_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let groups = tokio::task::spawn_blocking(move || {
        studyhall_engine::views::load_joined_groups(&db, claims.sub)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("failed to load joined groups: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(groups))
}

pub async fn created_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let groups = tokio::task::spawn_blocking(move || {
        studyhall_engine::views::load_created_groups(&db, &claims.email)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("failed to load created groups: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(groups))
}
