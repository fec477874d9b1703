use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{Booking, BookingDetails, NewBooking};
use crate::bus::{Bus, BusDraft, BusOrder};
use crate::search::BusSearchQuery;
use crate::CoreResult;

/// Result of deleting a bus together with its bookings.
#[derive(Debug, Clone, Default)]
pub struct DeletedBus {
    pub removed_bookings: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub full_name: String,
}

/// Repository trait for bus inventory access
#[async_trait]
pub trait BusRepository: Send + Sync {
    async fn create_bus(&self, bus: &Bus) -> CoreResult<()>;

    async fn get_bus(&self, id: Uuid) -> CoreResult<Option<Bus>>;

    /// Applies a validated draft; see [`BusDraft::apply_to`] for the
    /// available-seat rule. `None` when the bus does not exist.
    async fn update_bus(&self, id: Uuid, draft: &BusDraft) -> CoreResult<Option<Bus>>;

    /// Deletes the bus and cascades to its bookings. `None` when absent.
    async fn delete_bus(&self, id: Uuid) -> CoreResult<Option<DeletedBus>>;

    async fn list_buses(&self, order: BusOrder) -> CoreResult<Vec<Bus>>;

    async fn search_buses(&self, query: &BusSearchQuery) -> CoreResult<Vec<Bus>>;
}

/// Repository trait for booking access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Reserves seats and inserts the booking as one atomic step: the bus's
    /// `available_seats` is decremented only if it covers the request, and
    /// the fare is read in the same step.
    async fn create_booking(&self, booking: NewBooking) -> CoreResult<Booking>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<BookingDetails>>;

    /// Confirmed → cancelled, restoring the seats to the bus in the same
    /// step. Fails with `Conflict` if the booking is already cancelled.
    async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<BookingDetails>>;

    /// Newest first.
    async fn list_all(&self) -> CoreResult<Vec<BookingDetails>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn upsert_profile(&self, profile: &Profile) -> CoreResult<()>;

    async fn get_profile(&self, user_id: &str) -> CoreResult<Option<Profile>>;
}
