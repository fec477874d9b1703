use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use busline_core::repository::{
    BookingRepository, BusRepository, DeletedBus, Profile, ProfileRepository,
};
use busline_core::{
    pricing, Booking, BookingDetails, BookingStatus, Bus, BusDraft, BusOrder, BusSearchQuery,
    CoreError, CoreResult, NewBooking,
};

#[derive(Default)]
struct Tables {
    buses: HashMap<Uuid, Bus>,
    bookings: HashMap<Uuid, Booking>,
    profiles: HashMap<String, String>,
}

impl Tables {
    fn details(&self, booking: &Booking) -> BookingDetails {
        BookingDetails {
            booking: booking.clone(),
            bus: self.buses.get(&booking.bus_id).map(Bus::summary),
            account_name: self.profiles.get(&booking.user_id).cloned(),
        }
    }

    fn newest_first<'a>(&self, bookings: impl Iterator<Item = &'a Booking>) -> Vec<BookingDetails> {
        let mut found: Vec<&Booking> = bookings.collect();
        found.sort_by(|a, b| b.booking_date.cmp(&a.booking_date).then(a.id.cmp(&b.id)));
        found.into_iter().map(|b| self.details(b)).collect()
    }
}

/// Process-local store used when no database is configured and in tests.
/// All three repositories share one lock, so seat accounting and booking
/// writes are atomic with respect to each other.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusRepository for MemoryStore {
    async fn create_bus(&self, bus: &Bus) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.buses.contains_key(&bus.id) {
            return Err(CoreError::Conflict(format!("bus {} already exists", bus.id)));
        }
        tables.buses.insert(bus.id, bus.clone());
        Ok(())
    }

    async fn get_bus(&self, id: Uuid) -> CoreResult<Option<Bus>> {
        Ok(self.tables.read().await.buses.get(&id).cloned())
    }

    async fn update_bus(&self, id: Uuid, draft: &BusDraft) -> CoreResult<Option<Bus>> {
        let mut tables = self.tables.write().await;
        Ok(tables.buses.get_mut(&id).map(|bus| {
            draft.apply_to(bus);
            bus.clone()
        }))
    }

    async fn delete_bus(&self, id: Uuid) -> CoreResult<Option<DeletedBus>> {
        let mut tables = self.tables.write().await;
        if tables.buses.remove(&id).is_none() {
            return Ok(None);
        }
        let removed_bookings: Vec<Uuid> = tables
            .bookings
            .values()
            .filter(|b| b.bus_id == id)
            .map(|b| b.id)
            .collect();
        for booking_id in &removed_bookings {
            tables.bookings.remove(booking_id);
        }
        Ok(Some(DeletedBus { removed_bookings }))
    }

    async fn list_buses(&self, order: BusOrder) -> CoreResult<Vec<Bus>> {
        let mut buses: Vec<Bus> = self.tables.read().await.buses.values().cloned().collect();
        order.sort(&mut buses);
        Ok(buses)
    }

    async fn search_buses(&self, query: &BusSearchQuery) -> CoreResult<Vec<Bus>> {
        Ok(query.apply(self.tables.read().await.buses.values()))
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(&self, booking: NewBooking) -> CoreResult<Booking> {
        let requested = booking.seat_count()?;
        let mut tables = self.tables.write().await;

        let bus = tables
            .buses
            .get_mut(&booking.bus_id)
            .ok_or_else(|| CoreError::NotFound(format!("bus {}", booking.bus_id)))?;
        if bus.available_seats < requested {
            return Err(CoreError::InsufficientSeats {
                requested,
                available: bus.available_seats,
            });
        }
        let total_fare_cents = pricing::total_fare(bus.fare_cents, booking.seat_numbers.len())?;
        bus.available_seats -= requested;

        let booking = booking.into_booking(total_fare_cents);
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<BookingDetails>> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.get(&id).map(|b| tables.details(b)))
    }

    async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking> {
        let mut tables = self.tables.write().await;

        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict(format!("booking {} is already cancelled", id)));
        }
        let restored = booking.seat_count()?;
        booking.status = BookingStatus::Cancelled;
        let booking = booking.clone();

        if let Some(bus) = tables.buses.get_mut(&booking.bus_id) {
            bus.available_seats = bus.available_seats.saturating_add(restored).min(bus.total_seats);
        }
        Ok(booking)
    }

    async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<BookingDetails>> {
        let tables = self.tables.read().await;
        Ok(tables.newest_first(tables.bookings.values().filter(|b| b.user_id == user_id)))
    }

    async fn list_all(&self) -> CoreResult<Vec<BookingDetails>> {
        let tables = self.tables.read().await;
        Ok(tables.newest_first(tables.bookings.values()))
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn upsert_profile(&self, profile: &Profile) -> CoreResult<()> {
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile.full_name.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> CoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(user_id).map(|full_name| Profile {
            user_id: user_id.to_string(),
            full_name: full_name.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busline_core::{BookingRequest, ReservationService, Session};
    use busline_shared::{ChangeFeed, Table};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn service() -> (ReservationService, MemoryStore) {
        let store = MemoryStore::new();
        let svc = ReservationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            ChangeFeed::new(32),
        );
        (svc, store)
    }

    fn draft(available: Option<i32>, fare_cents: i64) -> BusDraft {
        serde_json::from_value(serde_json::json!({
            "bus_number": "DL-01",
            "bus_name": "Night Rider",
            "source": "Delhi",
            "destination": "Mumbai",
            "travel_date": "2024-05-01",
            "departure_time": "21:30:00",
            "arrival_time": "09:15:00",
            "total_seats": 4,
            "available_seats": available,
            "fare_cents": fare_cents,
        }))
        .unwrap()
    }

    fn request(bus_id: Uuid, seats: &[&str]) -> BookingRequest {
        serde_json::from_value(serde_json::json!({
            "bus_id": bus_id,
            "seats": seats,
            "passenger_name": "Ada",
            "passenger_phone": "+15550100",
            "passenger_email": "ada@example.com",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_bookings_cannot_oversell() {
        let (svc, store) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(Some(2), 1000)).await.unwrap();

        let alice = Session::user("alice");
        let bob = Session::user("bob");
        let (a, b) = tokio::join!(
            svc.book(&alice, request(bus.id, &["A1", "A2"])),
            svc.book(&bob, request(bus.id, &["B1", "B2"])),
        );

        let outcomes = [a, b];
        let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(CoreError::InsufficientSeats { requested: 2, available: 0 })
        )));

        let bus = store.get_bus(bus.id).await.unwrap().unwrap();
        assert_eq!(bus.available_seats, 0);
        assert!(bus.seats_consistent());
    }

    #[tokio::test]
    async fn test_total_fare_fixed_at_booking_time() {
        let (svc, _) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let user = Session::user("alice");

        let booking = svc.book(&user, request(bus.id, &["A1", "A2"])).await.unwrap();
        assert_eq!(booking.total_fare_cents, 2000);

        svc.update_bus(&admin, bus.id, draft(None, 5000)).await.unwrap();
        let details = svc.booking(&user, booking.id).await.unwrap();
        assert_eq!(details.booking.total_fare_cents, 2000);
    }

    #[tokio::test]
    async fn test_cancel_changes_status_and_restores_seats() {
        let (svc, store) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let user = Session::user("alice");

        let booking = svc.book(&user, request(bus.id, &["A1", "A2", "A3"])).await.unwrap();
        assert_eq!(store.get_bus(bus.id).await.unwrap().unwrap().available_seats, 1);

        let cancelled = svc.cancel(&user, booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        let mut expected = booking.clone();
        expected.status = BookingStatus::Cancelled;
        assert_eq!(cancelled, expected);
        assert_eq!(store.get_bus(bus.id).await.unwrap().unwrap().available_seats, 4);

        assert!(matches!(svc.cancel(&user, booking.id).await, Err(CoreError::Conflict(_))));
        assert_eq!(store.get_bus(bus.id).await.unwrap().unwrap().available_seats, 4);
    }

    #[tokio::test]
    async fn test_restore_is_clamped_to_capacity() {
        let (svc, store) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let user = Session::user("alice");

        let booking = svc.book(&user, request(bus.id, &["A1", "A2"])).await.unwrap();
        // Admin resets the count by hand before the cancellation lands.
        svc.update_bus(&admin, bus.id, draft(Some(4), 1000)).await.unwrap();
        svc.cancel(&user, booking.id).await.unwrap();

        let bus = store.get_bus(bus.id).await.unwrap().unwrap();
        assert_eq!(bus.available_seats, 4);
        assert!(bus.seats_consistent());
    }

    #[tokio::test]
    async fn test_other_users_cannot_touch_booking() {
        let (svc, _) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let booking = svc.book(&Session::user("alice"), request(bus.id, &["A1"])).await.unwrap();

        let mallory = Session::user("mallory");
        assert!(matches!(svc.cancel(&mallory, booking.id).await, Err(CoreError::Forbidden(_))));
        assert!(matches!(svc.ticket(&mallory, booking.id).await, Err(CoreError::Forbidden(_))));
        assert!(svc.cancel(&admin, booking.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_booking_unknown_bus_and_validation() {
        let (svc, _) = service();
        let user = Session::user("alice");
        assert!(matches!(
            svc.book(&user, request(Uuid::new_v4(), &["A1"])).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            svc.book(&user, request(Uuid::new_v4(), &[" "])).await,
            Err(CoreError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_only_bus_management() {
        let (svc, _) = service();
        let user = Session::user("alice");
        assert!(matches!(svc.create_bus(&user, draft(None, 1000)).await, Err(CoreError::Forbidden(_))));
        assert!(matches!(svc.list_buses(&user).await, Err(CoreError::Forbidden(_))));
        assert!(matches!(svc.all_bookings(&user).await, Err(CoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_bus_cascades_to_bookings() {
        let (svc, store) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let booking = svc.book(&Session::user("alice"), request(bus.id, &["A1"])).await.unwrap();

        let mut booking_changes = svc.feed().subscribe(Table::Bookings);
        svc.delete_bus(&admin, bus.id).await.unwrap();

        assert!(store.get_booking(booking.id).await.unwrap().is_none());
        assert!(booking_changes.recv().await.is_some());
        assert!(matches!(svc.delete_bus(&admin, bus.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_excludes_sold_out_buses() {
        let (svc, _) = service();
        let admin = Session::admin("admin");
        let open = svc.create_bus(&admin, draft(Some(1), 1000)).await.unwrap();
        svc.create_bus(&admin, draft(Some(0), 1000)).await.unwrap();

        let found = svc
            .search(&BusSearchQuery {
                source: Some("del".into()),
                destination: Some("MUM".into()),
                date: NaiveDate::from_ymd_opt(2024, 5, 1),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, open.id);

        svc.book(&Session::user("alice"), request(open.id, &["A1"])).await.unwrap();
        assert!(svc.search(&BusSearchQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_my_bookings_joined_and_newest_first() {
        let (svc, _) = service();
        let admin = Session::admin("admin");
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let alice = Session::user("alice");
        svc.upsert_profile(&alice, "Alice Liddell").await.unwrap();

        let first = svc.book(&alice, request(bus.id, &["A1"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = svc.book(&alice, request(bus.id, &["A2"])).await.unwrap();
        svc.book(&Session::user("bob"), request(bus.id, &["A3"])).await.unwrap();

        let mine = svc.my_bookings(&alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].booking.id, second.id);
        assert_eq!(mine[1].booking.id, first.id);
        assert_eq!(mine[0].bus.as_ref().unwrap().bus_number, "DL-01");
        assert_eq!(mine[0].account_name.as_deref(), Some("Alice Liddell"));

        assert_eq!(svc.all_bookings(&admin).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_monitor_refetches_on_change_and_unsubscribes() {
        let (svc, _) = service();
        let admin = Session::admin("admin");
        let mut monitor = svc.mount_monitor(&admin).await.unwrap();
        assert!(monitor.snapshot().buses.is_empty());
        let mounted_at = monitor.snapshot().last_refreshed;
        assert_eq!(svc.feed().subscriber_count(Table::Buses), 1);
        assert_eq!(svc.feed().subscriber_count(Table::Bookings), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let bus = svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        let table = tokio::time::timeout(Duration::from_secs(1), monitor.next_refresh())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(table, Table::Buses);
        assert_eq!(monitor.snapshot().buses[0].id, bus.id);
        assert!(monitor.snapshot().last_refreshed > mounted_at);

        monitor.unmount();
        assert_eq!(svc.feed().subscriber_count(Table::Buses), 0);
        assert_eq!(svc.feed().subscriber_count(Table::Bookings), 0);
    }

    #[tokio::test]
    async fn test_monitor_refetches_after_missing_notifications() {
        let store = MemoryStore::new();
        let svc = ReservationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            ChangeFeed::new(1),
        );
        let admin = Session::admin("admin");
        let mut monitor = svc.mount_monitor(&admin).await.unwrap();

        // the second insert overwrites the first in a one-slot channel
        svc.create_bus(&admin, draft(None, 1000)).await.unwrap();
        svc.create_bus(&admin, draft(None, 1500)).await.unwrap();

        let table = tokio::time::timeout(Duration::from_secs(1), monitor.next_refresh())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(table, Table::Buses);
        assert_eq!(monitor.snapshot().buses.len(), 2);
    }

    #[tokio::test]
    async fn test_monitor_requires_admin() {
        let (svc, _) = service();
        assert!(matches!(
            svc.mount_monitor(&Session::user("alice")).await,
            Err(CoreError::Forbidden(_))
        ));
    }
}
