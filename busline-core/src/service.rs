use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use busline_shared::{ChangeEvent, ChangeFeed, ChangeKind, Table};

use crate::booking::{Booking, BookingDetails, BookingRequest};
use crate::bus::{Bus, BusDraft, BusOrder};
use crate::monitor::MonitorView;
use crate::repository::{BookingRepository, BusRepository, Profile, ProfileRepository};
use crate::search::BusSearchQuery;
use crate::session::Session;
use crate::ticket::{self, Ticket};
use crate::{CoreError, CoreResult};

/// Bus inventory and booking operations. Every write that succeeds publishes
/// a change event on the channel of each table it touched.
#[derive(Clone)]
pub struct ReservationService {
    buses: Arc<dyn BusRepository>,
    bookings: Arc<dyn BookingRepository>,
    profiles: Arc<dyn ProfileRepository>,
    feed: ChangeFeed,
}

impl ReservationService {
    pub fn new(
        buses: Arc<dyn BusRepository>,
        bookings: Arc<dyn BookingRepository>,
        profiles: Arc<dyn ProfileRepository>,
        feed: ChangeFeed,
    ) -> Self {
        Self { buses, bookings, profiles, feed }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn notify(&self, table: Table, kind: ChangeKind, record_id: Uuid) {
        self.feed.publish(ChangeEvent::new(table, kind, record_id));
    }

    // Buses

    pub async fn search(&self, query: &BusSearchQuery) -> CoreResult<Vec<Bus>> {
        self.buses.search_buses(&query.normalized()).await
    }

    pub async fn get_bus(&self, id: Uuid) -> CoreResult<Bus> {
        self.buses
            .get_bus(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("bus {}", id)))
    }

    pub async fn list_buses(&self, session: &Session) -> CoreResult<Vec<Bus>> {
        session.require_admin()?;
        self.buses.list_buses(BusOrder::TravelDate).await
    }

    pub async fn create_bus(&self, session: &Session, draft: BusDraft) -> CoreResult<Bus> {
        session.require_admin()?;
        let bus = draft
            .validate()?
            .into_bus(Uuid::new_v4(), &session.user_id, Utc::now());
        self.buses.create_bus(&bus).await?;

        info!(bus_id = %bus.id, bus_number = %bus.bus_number, "Bus created");
        self.notify(Table::Buses, ChangeKind::Insert, bus.id);
        Ok(bus)
    }

    pub async fn update_bus(&self, session: &Session, id: Uuid, draft: BusDraft) -> CoreResult<Bus> {
        session.require_admin()?;
        let draft = draft.validate()?;
        let bus = self
            .buses
            .update_bus(id, &draft)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("bus {}", id)))?;

        info!(bus_id = %id, "Bus updated");
        self.notify(Table::Buses, ChangeKind::Update, id);
        Ok(bus)
    }

    pub async fn delete_bus(&self, session: &Session, id: Uuid) -> CoreResult<()> {
        session.require_admin()?;
        let deleted = self
            .buses
            .delete_bus(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("bus {}", id)))?;

        if !deleted.removed_bookings.is_empty() {
            warn!(bus_id = %id, bookings = deleted.removed_bookings.len(), "Deleted bus had bookings");
        }
        self.notify(Table::Buses, ChangeKind::Delete, id);
        for booking_id in deleted.removed_bookings {
            self.notify(Table::Bookings, ChangeKind::Delete, booking_id);
        }
        Ok(())
    }

    // Bookings

    pub async fn book(&self, session: &Session, request: BookingRequest) -> CoreResult<Booking> {
        let new_booking = request.validate(&session.user_id)?;
        let booking = self.bookings.create_booking(new_booking).await?;

        info!(
            booking_id = %booking.id,
            bus_id = %booking.bus_id,
            seats = booking.seat_numbers.len(),
            "Booking confirmed"
        );
        self.notify(Table::Bookings, ChangeKind::Insert, booking.id);
        self.notify(Table::Buses, ChangeKind::Update, booking.bus_id);
        Ok(booking)
    }

    pub async fn cancel(&self, session: &Session, id: Uuid) -> CoreResult<Booking> {
        let existing = self.booking(session, id).await?;
        let booking = self.bookings.cancel_booking(existing.booking.id).await?;

        info!(booking_id = %id, "Booking cancelled");
        self.notify(Table::Bookings, ChangeKind::Update, id);
        self.notify(Table::Buses, ChangeKind::Update, booking.bus_id);
        Ok(booking)
    }

    pub async fn booking(&self, session: &Session, id: Uuid) -> CoreResult<BookingDetails> {
        let details = self
            .bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;
        session.require_access(&details.booking.user_id)?;
        Ok(details)
    }

    pub async fn my_bookings(&self, session: &Session) -> CoreResult<Vec<BookingDetails>> {
        self.bookings.list_for_user(&session.user_id).await
    }

    pub async fn all_bookings(&self, session: &Session) -> CoreResult<Vec<BookingDetails>> {
        session.require_admin()?;
        self.bookings.list_all().await
    }

    pub async fn ticket(&self, session: &Session, id: Uuid) -> CoreResult<Ticket> {
        let details = self.booking(session, id).await?;
        ticket::render(&details)
    }

    // Profiles & monitor

    pub async fn upsert_profile(&self, session: &Session, full_name: &str) -> CoreResult<Profile> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(CoreError::ValidationError("full_name is required".to_string()));
        }
        let profile = Profile {
            user_id: session.user_id.clone(),
            full_name: full_name.to_string(),
        };
        self.profiles.upsert_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn profile(&self, session: &Session) -> CoreResult<Profile> {
        self.profiles
            .get_profile(&session.user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("profile".to_string()))
    }

    pub async fn mount_monitor(&self, session: &Session) -> CoreResult<MonitorView> {
        session.require_admin()?;
        MonitorView::mount(self.buses.clone(), self.bookings.clone(), &self.feed).await
    }
}
