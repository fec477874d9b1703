pub mod booking;
pub mod bus;
pub mod monitor;
pub mod pricing;
pub mod repository;
pub mod search;
pub mod service;
pub mod session;
pub mod ticket;

pub use booking::{Booking, BookingDetails, BookingRequest, BookingStatus, NewBooking};
pub use bus::{Bus, BusDraft, BusOrder, BusSummary};
pub use monitor::{MonitorSnapshot, MonitorView};
pub use search::BusSearchQuery;
pub use service::ReservationService;
pub use session::{Role, Session};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Not enough seats available: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
