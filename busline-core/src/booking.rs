use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use busline_shared::pii::Masked;

use crate::bus::BusSummary;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::StorageError(format!(
                "unknown booking status: {}",
                other
            ))),
        }
    }
}

/// A passenger's reservation of one or more seats on a bus.
///
/// Everything except `status` is fixed at creation; `total_fare_cents` is
/// the fare at booking time and is never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub user_id: String,
    pub seat_numbers: Vec<String>,
    pub total_fare_cents: i64,
    pub passenger_name: String,
    pub passenger_phone: Masked<String>,
    pub passenger_email: Masked<String>,
    pub status: BookingStatus,
    pub booking_date: DateTime<Utc>,
}

/// A booking joined with its bus and the account holder's profile name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub bus: Option<BusSummary>,
    pub account_name: Option<String>,
}

/// Seats as a list, or as the comma-separated text typed into a form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeatSelection {
    List(Vec<String>),
    Text(String),
}

impl SeatSelection {
    /// Trimmed labels in request order, empties dropped. Duplicates are kept.
    pub fn labels(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            SeatSelection::List(items) => items.iter().map(String::as_str).collect(),
            SeatSelection::Text(text) => text.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub bus_id: Uuid,
    pub seats: SeatSelection,
    pub passenger_name: String,
    pub passenger_phone: Masked<String>,
    pub passenger_email: Masked<String>,
}

/// A validated booking request ready for the atomic seat reservation.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub user_id: String,
    pub seat_numbers: Vec<String>,
    pub passenger_name: String,
    pub passenger_phone: Masked<String>,
    pub passenger_email: Masked<String>,
    pub booking_date: DateTime<Utc>,
}

/// Seat labels as an `i32` count, the width `available_seats` is stored in.
pub fn seat_count(seat_numbers: &[String]) -> CoreResult<i32> {
    i32::try_from(seat_numbers.len())
        .map_err(|_| CoreError::ValidationError("Too many seats".to_string()))
}

impl Booking {
    pub fn seat_count(&self) -> CoreResult<i32> {
        seat_count(&self.seat_numbers)
    }
}

impl NewBooking {
    pub fn seat_count(&self) -> CoreResult<i32> {
        seat_count(&self.seat_numbers)
    }

    pub fn into_booking(self, total_fare_cents: i64) -> Booking {
        Booking {
            id: self.id,
            bus_id: self.bus_id,
            user_id: self.user_id,
            seat_numbers: self.seat_numbers,
            total_fare_cents,
            passenger_name: self.passenger_name,
            passenger_phone: self.passenger_phone,
            passenger_email: self.passenger_email,
            status: BookingStatus::Confirmed,
            booking_date: self.booking_date,
        }
    }
}

impl BookingRequest {
    pub fn validate(self, user_id: &str) -> CoreResult<NewBooking> {
        let name = self.passenger_name.trim();
        let phone = self.passenger_phone.expose().trim();
        let email = self.passenger_email.expose().trim();
        if name.is_empty() || phone.is_empty() || email.is_empty() {
            return Err(CoreError::ValidationError(
                "Please fill all passenger fields".to_string(),
            ));
        }

        let seat_numbers = self.seats.labels();
        if seat_numbers.is_empty() {
            return Err(CoreError::ValidationError(
                "At least one seat is required".to_string(),
            ));
        }
        seat_count(&seat_numbers)?;

        Ok(NewBooking {
            id: Uuid::new_v4(),
            bus_id: self.bus_id,
            user_id: user_id.to_string(),
            seat_numbers,
            passenger_name: name.to_string(),
            passenger_phone: Masked(phone.to_string()),
            passenger_email: Masked(email.to_string()),
            booking_date: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seats: serde_json::Value, name: &str) -> BookingRequest {
        serde_json::from_value(serde_json::json!({
            "bus_id": Uuid::new_v4(),
            "seats": seats,
            "passenger_name": name,
            "passenger_phone": "+15550100",
            "passenger_email": "ada@example.com",
        }))
        .unwrap()
    }

    #[test]
    fn test_seat_text_is_split_and_trimmed() {
        let req = request(serde_json::json!("A1, A2,, B1 ,"), "Ada");
        let booking = req.validate("user-1").unwrap();
        assert_eq!(booking.seat_numbers, vec!["A1", "A2", "B1"]);
        assert_eq!(booking.seat_count().unwrap(), 3);
        assert_eq!(booking.user_id, "user-1");
    }

    #[test]
    fn test_seat_list_keeps_order_and_duplicates() {
        let req = request(serde_json::json!(["B2", " A1", "B2"]), "Ada");
        let booking = req.validate("user-1").unwrap();
        assert_eq!(booking.seat_numbers, vec!["B2", "A1", "B2"]);
    }

    #[test]
    fn test_confirmed_booking_counts_every_label() {
        let booking = request(serde_json::json!(["B2", "A1", "B2"]), "Ada")
            .validate("user-1")
            .unwrap()
            .into_booking(3000);
        assert_eq!(booking.seat_count().unwrap(), 3);
        assert_eq!(seat_count(&[]).unwrap(), 0);
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(matches!(
            request(serde_json::json!("A1"), "  ").validate("u"),
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            request(serde_json::json!(" , "), "Ada").validate("u"),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_status_round_trip_through_text() {
        assert_eq!("cancelled".parse::<BookingStatus>().unwrap(), BookingStatus::Cancelled);
        assert_eq!(BookingStatus::Confirmed.to_string(), "confirmed");
        assert!("pending".parse::<BookingStatus>().is_err());
    }
}
