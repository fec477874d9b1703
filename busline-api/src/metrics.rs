use async_trait::async_trait;
use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use busline_core::CoreError;
use busline_shared::ChangeEvent;
use busline_store::events::ChangeSink;

use crate::error::AppError;
use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub bookings_rejected: IntCounterVec,
    pub bookings_cancelled: IntCounter,
    pub change_events: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new("busline_bookings_created_total", "Bookings confirmed")?;
        let bookings_rejected = IntCounterVec::new(
            Opts::new("busline_bookings_rejected_total", "Booking attempts rejected"),
            &["reason"],
        )?;
        let bookings_cancelled = IntCounter::new("busline_bookings_cancelled_total", "Bookings cancelled")?;
        let change_events = IntCounterVec::new(
            Opts::new("busline_change_events_total", "Change notifications published"),
            &["table"],
        )?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(bookings_rejected.clone()))?;
        registry.register(Box::new(bookings_cancelled.clone()))?;
        registry.register(Box::new(change_events.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            bookings_rejected,
            bookings_cancelled,
            change_events,
        })
    }

    pub fn record_rejection(&self, err: &CoreError) {
        let reason = match err {
            CoreError::ValidationError(_) => "validation",
            CoreError::NotFound(_) => "not_found",
            CoreError::InsufficientSeats { .. } => "insufficient_seats",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Conflict(_) => "conflict",
            CoreError::StorageError(_) => "storage",
        };
        self.bookings_rejected.with_label_values(&[reason]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[async_trait]
impl ChangeSink for Metrics {
    async fn deliver(&self, event: &ChangeEvent) -> Result<(), String> {
        self.change_events.with_label_values(&[event.table.as_str()]).inc();
        Ok(())
    }
}

/// GET /metrics
pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_labelled_by_reason() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection(&CoreError::InsufficientSeats { requested: 3, available: 1 });
        metrics.bookings_created.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("busline_bookings_rejected_total{reason=\"insufficient_seats\"} 1"));
        assert!(text.contains("busline_bookings_created_total 1"));
    }
}
