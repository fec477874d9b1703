use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use busline_core::repository::BookingRepository;
use busline_core::{
    pricing, Booking, BookingDetails, BookingStatus, BusSummary, CoreError, CoreResult, NewBooking,
};
use busline_shared::pii::Masked;

use crate::storage;

const BOOKING_COLUMNS: &str = "id, bus_id, user_id, seat_numbers, total_fare_cents, passenger_name, \
     passenger_phone, passenger_email, status, booking_date";

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.bus_id, b.user_id, b.seat_numbers, b.total_fare_cents, b.passenger_name,
           b.passenger_phone, b.passenger_email, b.status, b.booking_date,
           bu.bus_number, bu.bus_name, bu.source, bu.destination, bu.travel_date,
           bu.departure_time, bu.arrival_time,
           p.full_name AS account_name
    FROM bookings b
    LEFT JOIN buses bu ON bu.id = b.bus_id
    LEFT JOIN profiles p ON p.user_id = b.user_id
"#;

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    bus_id: Uuid,
    user_id: String,
    seat_numbers: Vec<String>,
    total_fare_cents: i64,
    passenger_name: String,
    passenger_phone: String,
    passenger_email: String,
    status: String,
    booking_date: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            bus_id: row.bus_id,
            user_id: row.user_id,
            seat_numbers: row.seat_numbers,
            total_fare_cents: row.total_fare_cents,
            passenger_name: row.passenger_name,
            passenger_phone: Masked(row.passenger_phone),
            passenger_email: Masked(row.passenger_email),
            status: row.status.parse::<BookingStatus>()?,
            booking_date: row.booking_date,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DetailsRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    bus_number: Option<String>,
    bus_name: Option<String>,
    source: Option<String>,
    destination: Option<String>,
    travel_date: Option<NaiveDate>,
    departure_time: Option<NaiveTime>,
    arrival_time: Option<NaiveTime>,
    account_name: Option<String>,
}

impl TryFrom<DetailsRow> for BookingDetails {
    type Error = CoreError;

    fn try_from(row: DetailsRow) -> Result<Self, Self::Error> {
        let bus = match (
            row.bus_number,
            row.bus_name,
            row.source,
            row.destination,
            row.travel_date,
            row.departure_time,
            row.arrival_time,
        ) {
            (
                Some(bus_number),
                Some(bus_name),
                Some(source),
                Some(destination),
                Some(travel_date),
                Some(departure_time),
                Some(arrival_time),
            ) => Some(BusSummary {
                bus_number,
                bus_name,
                source,
                destination,
                travel_date,
                departure_time,
                arrival_time,
            }),
            _ => None,
        };

        Ok(BookingDetails {
            booking: Booking::try_from(row.booking)?,
            bus,
            account_name: row.account_name,
        })
    }
}

fn into_details(rows: Vec<DetailsRow>) -> CoreResult<Vec<BookingDetails>> {
    rows.into_iter().map(BookingDetails::try_from).collect()
}

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, booking: NewBooking) -> CoreResult<Booking> {
        let requested = booking.seat_count()?;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Conditional decrement: the availability check and the write are one statement.
        let fare: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE buses SET available_seats = available_seats - $2
            WHERE id = $1 AND available_seats >= $2
            RETURNING fare_cents
            "#,
        )
        .bind(booking.bus_id)
        .bind(requested)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let fare_cents = match fare {
            Some(fare) => fare,
            None => {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT available_seats FROM buses WHERE id = $1")
                        .bind(booking.bus_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(storage)?;
                tx.rollback().await.map_err(storage)?;
                return Err(match available {
                    Some(available) => CoreError::InsufficientSeats { requested, available },
                    None => CoreError::NotFound(format!("bus {}", booking.bus_id)),
                });
            }
        };

        let total_fare_cents = pricing::total_fare(fare_cents, booking.seat_numbers.len())?;
        let booking = booking.into_booking(total_fare_cents);

        sqlx::query(
            r#"
            INSERT INTO bookings (id, bus_id, user_id, seat_numbers, total_fare_cents, passenger_name,
                                  passenger_phone, passenger_email, status, booking_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(booking.id)
        .bind(booking.bus_id)
        .bind(&booking.user_id)
        .bind(&booking.seat_numbers)
        .bind(booking.total_fare_cents)
        .bind(&booking.passenger_name)
        .bind(booking.passenger_phone.expose())
        .bind(booking.passenger_email.expose())
        .bind(booking.status.as_str())
        .bind(booking.booking_date)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        debug!(booking_id = %booking.id, seats = requested, "Seats reserved");
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<BookingDetails>> {
        let row: Option<DetailsRow> = sqlx::query_as(&format!("{} WHERE b.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.map(BookingDetails::try_from).transpose()
    }

    async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET status = $2 WHERE id = $1 AND status = $3 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(BookingStatus::Cancelled.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let booking = match row {
            Some(row) => Booking::try_from(row)?,
            None => {
                let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM bookings WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(storage)?;
                tx.rollback().await.map_err(storage)?;
                return Err(match exists {
                    Some(_) => CoreError::Conflict(format!("booking {} is already cancelled", id)),
                    None => CoreError::NotFound(format!("booking {}", id)),
                });
            }
        };

        let restored = booking.seat_count()?;
        sqlx::query(
            "UPDATE buses SET available_seats = LEAST(total_seats, available_seats + $2) WHERE id = $1",
        )
        .bind(booking.bus_id)
        .bind(restored)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(booking)
    }

    async fn list_for_user(&self, user_id: &str) -> CoreResult<Vec<BookingDetails>> {
        let rows: Vec<DetailsRow> = sqlx::query_as(&format!(
            "{} WHERE b.user_id = $1 ORDER BY b.booking_date DESC, b.id ASC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        into_details(rows)
    }

    async fn list_all(&self) -> CoreResult<Vec<BookingDetails>> {
        let rows: Vec<DetailsRow> = sqlx::query_as(&format!(
            "{} ORDER BY b.booking_date DESC, b.id ASC",
            DETAILS_SELECT
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        into_details(rows)
    }
}
