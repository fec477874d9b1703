use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use busline_core::Role;

use crate::{error::AppError, middleware::auth::issue_token, state::AppState};

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub admin_key: String,
    /// Recorded as `created_by` on buses this admin creates.
    #[serde(default)]
    pub user_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/guest", post(login_guest))
        .route("/v1/auth/admin", post(login_admin))
}

async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let user_id = format!("guest-{}", Uuid::new_v4());
    respond(&state, user_id, Role::User)
}

/// POST /v1/auth/admin
async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let expected = state
        .auth
        .admin_key
        .as_deref()
        .ok_or_else(|| AppError::AuthenticationError("Admin sign-in is disabled".to_string()))?;

    if !keys_match(expected.as_bytes(), req.admin_key.as_bytes()) {
        tracing::warn!("Rejected admin sign-in");
        return Err(AppError::AuthenticationError("Invalid admin key".to_string()));
    }

    let user_id = req
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "admin".to_string());
    tracing::info!(user_id = %user_id, "Admin signed in");
    respond(&state, user_id, Role::Admin)
}

fn respond(state: &AppState, user_id: String, role: Role) -> Result<Json<AuthResponse>, AppError> {
    let token = issue_token(&state.auth, &user_id, role)
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse { token, user_id }))
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(expected: &[u8], given: &[u8]) -> bool {
    expected.len() == given.len()
        && expected
            .iter()
            .zip(given)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
