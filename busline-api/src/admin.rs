use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use busline_core::{BookingDetails, Bus, BusDraft, Session};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/buses", get(list_buses).post(create_bus))
        .route("/v1/admin/buses/{id}", put(update_bus).delete(delete_bus))
        .route("/v1/admin/bookings", get(list_bookings))
}

// ============================================================================
// Bus Management Handlers
// ============================================================================

/// GET /v1/admin/buses
async fn list_buses(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Bus>>, AppError> {
    Ok(Json(state.service.list_buses(&session).await?))
}

/// POST /v1/admin/buses
async fn create_bus(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(draft): Json<BusDraft>,
) -> Result<(StatusCode, Json<Bus>), AppError> {
    let bus = state.service.create_bus(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(bus)))
}

/// PUT /v1/admin/buses/:id
async fn update_bus(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(draft): Json<BusDraft>,
) -> Result<Json<Bus>, AppError> {
    Ok(Json(state.service.update_bus(&session, id, draft).await?))
}

/// DELETE /v1/admin/buses/:id
/// Also removes the bus's bookings.
async fn delete_bus(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.service.delete_bus(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Booking Inspection
// ============================================================================

/// GET /v1/admin/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<BookingDetails>>, AppError> {
    Ok(Json(state.service.all_bookings(&session).await?))
}
