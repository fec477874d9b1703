use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::debug;
use uuid::Uuid;

use busline_core::{Bus, BusSearchQuery};

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/buses/search", get(search_buses))
        .route("/v1/buses/{id}", get(get_bus))
}

/// GET /v1/buses/search?source=&destination=&date=
async fn search_buses(
    State(state): State<AppState>,
    Query(query): Query<BusSearchQuery>,
) -> Result<Json<Vec<Bus>>, AppError> {
    let buses = state.service.search(&query).await?;
    debug!(results = buses.len(), "Bus search");
    Ok(Json(buses))
}

/// GET /v1/buses/:id
async fn get_bus(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Bus>, AppError> {
    Ok(Json(state.service.get_bus(id).await?))
}
