use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Deserialize;

use busline_core::repository::Profile;
use busline_core::Session;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    full_name: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/me/profile", get(get_profile).put(update_profile))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.service.profile(&session).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.service.upsert_profile(&session, &req.full_name).await?))
}
