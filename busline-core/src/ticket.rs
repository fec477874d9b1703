use chrono::SecondsFormat;

use crate::booking::BookingDetails;
use crate::pricing::format_amount;
use crate::{CoreError, CoreResult};

const RULE: &str = "=====================================";

/// A downloadable plain-text ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub filename: String,
    pub body: String,
}

/// Renders the ticket for one booking. The output depends only on the
/// booking and bus fields, so repeated calls give identical bytes.
pub fn render(details: &BookingDetails) -> CoreResult<Ticket> {
    let booking = &details.booking;
    let bus = details.bus.as_ref().ok_or_else(|| {
        CoreError::NotFound(format!("bus for booking {}", booking.id))
    })?;

    let lines = [
        format!("BUS TICKET - {}", booking.id),
        RULE.to_string(),
        format!("Passenger: {}", booking.passenger_name),
        format!("Phone: {}", booking.passenger_phone.expose()),
        format!("Email: {}", booking.passenger_email.expose()),
        String::new(),
        format!("Bus: {} ({})", bus.bus_name, bus.bus_number),
        format!("Route: {} → {}", bus.source, bus.destination),
        format!("Date: {}", bus.travel_date.format("%Y-%m-%d")),
        format!(
            "Time: {} - {}",
            bus.departure_time.format("%H:%M"),
            bus.arrival_time.format("%H:%M")
        ),
        String::new(),
        format!("Seats: {}", booking.seat_numbers.join(", ")),
        format!("Total Fare: {}", format_amount(booking.total_fare_cents)),
        format!("Status: {}", booking.status.as_str().to_uppercase()),
        String::new(),
        format!(
            "Booking Date: {}",
            booking.booking_date.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        RULE.to_string(),
    ];
    let mut body = lines.join("\n");
    body.push('\n');

    Ok(Ticket {
        filename: format!("ticket-{}.txt", booking.id),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{Booking, BookingStatus};
    use crate::bus::BusSummary;
    use busline_shared::pii::Masked;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    fn details() -> BookingDetails {
        BookingDetails {
            booking: Booking {
                id: Uuid::from_u128(7),
                bus_id: Uuid::from_u128(1),
                user_id: "user-1".into(),
                seat_numbers: vec!["A1".into(), "A2".into()],
                total_fare_cents: 2000,
                passenger_name: "Ada Lovelace".into(),
                passenger_phone: Masked("+15550100".into()),
                passenger_email: Masked("ada@example.com".into()),
                status: BookingStatus::Confirmed,
                booking_date: Utc.with_ymd_and_hms(2024, 4, 20, 10, 0, 0).unwrap(),
            },
            bus: Some(BusSummary {
                bus_number: "DL-MH-01".into(),
                bus_name: "Night Rider".into(),
                source: "Delhi".into(),
                destination: "Mumbai".into(),
                travel_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                departure_time: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
                arrival_time: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            }),
            account_name: None,
        }
    }

    #[test]
    fn test_ticket_contents() {
        let ticket = render(&details()).unwrap();
        assert_eq!(ticket.filename, format!("ticket-{}.txt", Uuid::from_u128(7)));
        assert!(ticket.body.contains("Passenger: Ada Lovelace"));
        assert!(ticket.body.contains("Bus: Night Rider (DL-MH-01)"));
        assert!(ticket.body.contains("Route: Delhi → Mumbai"));
        assert!(ticket.body.contains("Seats: A1, A2"));
        assert!(ticket.body.contains("Total Fare: $20.00"));
        assert!(ticket.body.contains("Time: 21:30 - 09:15"));
        assert!(ticket.body.contains("Status: CONFIRMED"));
        assert!(ticket.body.contains("Booking Date: 2024-04-20T10:00:00Z"));
    }

    #[test]
    fn test_ticket_layout() {
        let body = render(&details()).unwrap().body;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 17);
        assert_eq!(lines[0], format!("BUS TICKET - {}", Uuid::from_u128(7)));
        assert_eq!(lines[1], RULE);
        assert_eq!(lines[5], "");
        assert_eq!(lines[16], RULE);
        assert!(body.ends_with(&format!("{}\n", RULE)));
    }

    #[test]
    fn test_ticket_is_stable() {
        let d = details();
        assert_eq!(render(&d).unwrap().body.as_bytes(), render(&d).unwrap().body.as_bytes());
    }

    #[test]
    fn test_ticket_requires_bus() {
        let mut d = details();
        d.bus = None;
        assert!(matches!(render(&d), Err(CoreError::NotFound(_))));
    }
}
