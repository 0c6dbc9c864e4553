use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;

use studyhall_types::api::{Claims, UpdateProfileRequest};

use crate::AppState;
use crate::groups::status_for;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let gateway = state.gateway.clone();

    let profile = tokio::task::spawn_blocking(move || gateway.get_profile(claims.sub))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| status_for(&e))?;

    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let gateway = state.gateway.clone();

    let profile = tokio::task::spawn_blocking(move || {
        gateway.update_profile(
            claims.sub,
            &req.display_name,
            &req.bio,
            req.avatar_url.as_deref(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| status_for(&e))?;

    Ok(Json(profile))
}
