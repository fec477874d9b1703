use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use busline_core::{Booking, BookingDetails, BookingRequest, Session};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/ticket", get(download_ticket))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    match state.service.book(&session, req).await {
        Ok(booking) => {
            state.metrics.bookings_created.inc();
            Ok((StatusCode::CREATED, Json(booking)))
        }
        Err(e) => {
            state.metrics.record_rejection(&e);
            Err(e.into())
        }
    }
}

/// GET /v1/bookings
async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<BookingDetails>>, AppError> {
    Ok(Json(state.service.my_bookings(&session).await?))
}

/// GET /v1/bookings/:id
async fn get_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(state.service.booking(&session, id).await?))
}

/// POST /v1/bookings/:id/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.cancel(&session, id).await?;
    state.metrics.bookings_cancelled.inc();
    Ok(Json(booking))
}

/// GET /v1/bookings/:id/ticket
/// Plain-text ticket as a file download.
async fn download_ticket(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.service.ticket(&session, id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ticket.filename),
            ),
        ],
        ticket.body,
    ))
}
