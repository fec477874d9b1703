use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use busline_core::repository::{BusRepository, DeletedBus};
use busline_core::{Bus, BusDraft, BusOrder, BusSearchQuery, CoreResult};

use crate::storage;

pub(crate) const BUS_COLUMNS: &str = "id, bus_number, bus_name, source, destination, travel_date, \
     departure_time, arrival_time, total_seats, available_seats, fare_cents, created_by, created_at";

#[derive(sqlx::FromRow)]
pub(crate) struct BusRow {
    id: Uuid,
    bus_number: String,
    bus_name: String,
    source: String,
    destination: String,
    travel_date: NaiveDate,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
    total_seats: i32,
    available_seats: i32,
    fare_cents: i64,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<BusRow> for Bus {
    fn from(row: BusRow) -> Self {
        Bus {
            id: row.id,
            bus_number: row.bus_number,
            bus_name: row.bus_name,
            source: row.source,
            destination: row.destination,
            travel_date: row.travel_date,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            fare_cents: row.fare_cents,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub struct PgBusRepository {
    pool: PgPool,
}

impl PgBusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BusRepository for PgBusRepository {
    async fn create_bus(&self, bus: &Bus) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO buses (id, bus_number, bus_name, source, destination, travel_date,
                               departure_time, arrival_time, total_seats, available_seats,
                               fare_cents, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(bus.id)
        .bind(&bus.bus_number)
        .bind(&bus.bus_name)
        .bind(&bus.source)
        .bind(&bus.destination)
        .bind(bus.travel_date)
        .bind(bus.departure_time)
        .bind(bus.arrival_time)
        .bind(bus.total_seats)
        .bind(bus.available_seats)
        .bind(bus.fare_cents)
        .bind(&bus.created_by)
        .bind(bus.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn get_bus(&self, id: Uuid) -> CoreResult<Option<Bus>> {
        let row: Option<BusRow> =
            sqlx::query_as(&format!("SELECT {} FROM buses WHERE id = $1", BUS_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        Ok(row.map(Bus::from))
    }

    async fn update_bus(&self, id: Uuid, draft: &BusDraft) -> CoreResult<Option<Bus>> {
        // Without an explicit count the stored one is kept, clamped to the new capacity.
        let row: Option<BusRow> = sqlx::query_as(&format!(
            r#"
            UPDATE buses SET
                bus_number = $2,
                bus_name = $3,
                source = $4,
                destination = $5,
                travel_date = $6,
                departure_time = $7,
                arrival_time = $8,
                total_seats = $9,
                available_seats = COALESCE($10, LEAST(available_seats, $9)),
                fare_cents = $11
            WHERE id = $1
            RETURNING {}
            "#,
            BUS_COLUMNS
        ))
        .bind(id)
        .bind(&draft.bus_number)
        .bind(&draft.bus_name)
        .bind(&draft.source)
        .bind(&draft.destination)
        .bind(draft.travel_date)
        .bind(draft.departure_time)
        .bind(draft.arrival_time)
        .bind(draft.total_seats)
        .bind(draft.available_seats)
        .bind(draft.fare_cents)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(Bus::from))
    }

    async fn delete_bus(&self, id: Uuid) -> CoreResult<Option<DeletedBus>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let removed_bookings: Vec<Uuid> =
            sqlx::query_scalar("DELETE FROM bookings WHERE bus_id = $1 RETURNING id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(storage)?;

        let deleted = sqlx::query("DELETE FROM buses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(storage)?;
            return Ok(None);
        }

        tx.commit().await.map_err(storage)?;
        Ok(Some(DeletedBus { removed_bookings }))
    }

    async fn list_buses(&self, order: BusOrder) -> CoreResult<Vec<Bus>> {
        let order_by = match order {
            BusOrder::TravelDate => "travel_date ASC, departure_time ASC, id ASC",
            BusOrder::Newest => "created_at DESC, id ASC",
        };
        let rows: Vec<BusRow> =
            sqlx::query_as(&format!("SELECT {} FROM buses ORDER BY {}", BUS_COLUMNS, order_by))
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;

        Ok(rows.into_iter().map(Bus::from).collect())
    }

    async fn search_buses(&self, query: &BusSearchQuery) -> CoreResult<Vec<Bus>> {
        let query = query.normalized();
        let rows: Vec<BusRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM buses
            WHERE available_seats > 0
              AND ($1::text IS NULL OR source ILIKE $1)
              AND ($2::text IS NULL OR destination ILIKE $2)
              AND ($3::date IS NULL OR travel_date = $3)
            ORDER BY departure_time ASC, travel_date ASC, id ASC
            "#,
            BUS_COLUMNS
        ))
        .bind(query.source.as_deref().map(contains_pattern))
        .bind(query.destination.as_deref().map(contains_pattern))
        .bind(query.date)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(Bus::from).collect())
    }
}
