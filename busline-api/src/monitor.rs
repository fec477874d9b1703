use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream};
use tracing::error;

use busline_core::{MonitorSnapshot, MonitorView, Session};
use busline_shared::Table;

use crate::{error::AppError, state::AppState};

/// Sent in place of the underlying error, which may carry storage details.
const REFRESH_FAILED: &str = "Internal Server Error";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/monitor", get(current_snapshot))
        .route("/v1/admin/monitor/stream", get(stream_snapshots))
}

/// GET /v1/admin/monitor
async fn current_snapshot(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<MonitorSnapshot>, AppError> {
    let monitor = state.service.mount_monitor(&session).await?;
    let snapshot = monitor.snapshot().clone();
    monitor.unmount();
    Ok(Json(snapshot))
}

fn snapshot_event(snapshot: &MonitorSnapshot, changed: Option<Table>) -> Result<Event, axum::Error> {
    let event = Event::default().event("snapshot");
    let event = match changed {
        Some(table) => event.id(format!("{}-{}", table, snapshot.last_refreshed.timestamp_millis())),
        None => event,
    };
    event.json_data(snapshot)
}

/// GET /v1/admin/monitor/stream
/// One `snapshot` event on connect, then one after every refresh. The
/// monitor (and its subscriptions) lives exactly as long as the connection.
async fn stream_snapshots(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let monitor = state.service.mount_monitor(&session).await?;

    let events = stream::unfold((monitor, true), |(mut monitor, first): (MonitorView, bool)| async move {
        if first {
            let event = snapshot_event(monitor.snapshot(), None);
            return Some((event, (monitor, false)));
        }
        match monitor.next_refresh().await? {
            Ok(table) => {
                let event = snapshot_event(monitor.snapshot(), Some(table));
                Some((event, (monitor, false)))
            }
            Err(e) => {
                error!("Monitor refresh failed: {}", e);
                let event = Ok(Event::default().event("error").data(REFRESH_FAILED));
                Some((event, (monitor, false)))
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
