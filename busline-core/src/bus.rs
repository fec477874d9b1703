use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// A scheduled trip: route, date, times, capacity and fare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: Uuid,
    pub bus_number: String,
    pub bus_name: String,
    pub source: String,
    pub destination: String,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub total_seats: i32,
    pub available_seats: i32,
    /// Fare per seat in minor currency units.
    pub fare_cents: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Bus {
    pub fn summary(&self) -> BusSummary {
        BusSummary {
            bus_number: self.bus_number.clone(),
            bus_name: self.bus_name.clone(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            travel_date: self.travel_date,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
        }
    }

    pub fn seats_consistent(&self) -> bool {
        self.available_seats >= 0 && self.available_seats <= self.total_seats
    }
}

/// Bus fields attached to booking listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSummary {
    pub bus_number: String,
    pub bus_name: String,
    pub source: String,
    pub destination: String,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}

/// Admin-editable bus fields, used for both create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct BusDraft {
    pub bus_number: String,
    pub bus_name: String,
    pub source: String,
    pub destination: String,
    pub travel_date: NaiveDate,
    #[serde(deserialize_with = "clock::deserialize")]
    pub departure_time: NaiveTime,
    #[serde(deserialize_with = "clock::deserialize")]
    pub arrival_time: NaiveTime,
    pub total_seats: i32,
    /// Omitted on create means "all seats free"; omitted on update keeps the
    /// stored count, clamped to the new capacity.
    #[serde(default)]
    pub available_seats: Option<i32>,
    pub fare_cents: i64,
}

impl BusDraft {
    /// Trims text fields and checks the seat and fare invariants.
    pub fn validate(mut self) -> CoreResult<Self> {
        for (name, value) in [
            ("bus_number", &mut self.bus_number),
            ("bus_name", &mut self.bus_name),
            ("source", &mut self.source),
            ("destination", &mut self.destination),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(CoreError::ValidationError(format!("{} is required", name)));
            }
            *value = trimmed.to_string();
        }

        if self.total_seats <= 0 {
            return Err(CoreError::ValidationError(
                "total_seats must be positive".to_string(),
            ));
        }

        if let Some(available) = self.available_seats {
            if available < 0 || available > self.total_seats {
                return Err(CoreError::ValidationError(format!(
                    "available_seats must be between 0 and {}",
                    self.total_seats
                )));
            }
        }

        if self.fare_cents < 0 {
            return Err(CoreError::ValidationError(
                "fare must not be negative".to_string(),
            ));
        }

        Ok(self)
    }

    pub fn into_bus(self, id: Uuid, created_by: &str, created_at: DateTime<Utc>) -> Bus {
        let available_seats = self.available_seats.unwrap_or(self.total_seats);
        Bus {
            id,
            bus_number: self.bus_number,
            bus_name: self.bus_name,
            source: self.source,
            destination: self.destination,
            travel_date: self.travel_date,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            total_seats: self.total_seats,
            available_seats,
            fare_cents: self.fare_cents,
            created_by: created_by.to_string(),
            created_at,
        }
    }

    /// Overwrites the editable fields; id and creation metadata stay.
    pub fn apply_to(&self, bus: &mut Bus) {
        bus.bus_number = self.bus_number.clone();
        bus.bus_name = self.bus_name.clone();
        bus.source = self.source.clone();
        bus.destination = self.destination.clone();
        bus.travel_date = self.travel_date;
        bus.departure_time = self.departure_time;
        bus.arrival_time = self.arrival_time;
        bus.total_seats = self.total_seats;
        bus.available_seats = self
            .available_seats
            .unwrap_or_else(|| bus.available_seats.min(self.total_seats));
        bus.fare_cents = self.fare_cents;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOrder {
    /// Admin schedule listing.
    TravelDate,
    /// Monitor listing, most recently created first.
    Newest,
}

impl BusOrder {
    pub fn sort(&self, buses: &mut [Bus]) {
        match self {
            BusOrder::TravelDate => buses.sort_by(|a, b| {
                a.travel_date
                    .cmp(&b.travel_date)
                    .then(a.departure_time.cmp(&b.departure_time))
                    .then(a.id.cmp(&b.id))
            }),
            BusOrder::Newest => buses.sort_by(|a, b| {
                b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))
            }),
        }
    }
}

/// Accepts `HH:MM:SS` and the `HH:MM` form browsers send from time inputs.
mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_json(available: &str) -> String {
        format!(
            r#"{{
                "bus_number": " KA-01 ",
                "bus_name": "Night Rider",
                "source": "Delhi",
                "destination": "Mumbai",
                "travel_date": "2024-05-01",
                "departure_time": "21:30",
                "arrival_time": "09:15:00",
                "total_seats": 40,
                {}
                "fare_cents": 1500
            }}"#,
            available
        )
    }

    #[test]
    fn test_draft_defaults_available_to_capacity() {
        let draft: BusDraft = serde_json::from_str(&draft_json("")).unwrap();
        let draft = draft.validate().unwrap();
        assert_eq!(draft.bus_number, "KA-01");
        assert_eq!(draft.departure_time, NaiveTime::from_hms_opt(21, 30, 0).unwrap());

        let bus = draft.into_bus(Uuid::new_v4(), "admin-1", Utc::now());
        assert_eq!(bus.available_seats, 40);
        assert!(bus.seats_consistent());
    }

    #[test]
    fn test_draft_rejects_available_above_total() {
        let draft: BusDraft =
            serde_json::from_str(&draft_json(r#""available_seats": 41,"#)).unwrap();
        assert!(matches!(draft.validate(), Err(CoreError::ValidationError(_))));

        let draft: BusDraft =
            serde_json::from_str(&draft_json(r#""available_seats": -1,"#)).unwrap();
        assert!(matches!(draft.validate(), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_draft_rejects_blank_and_negative() {
        let mut draft: BusDraft = serde_json::from_str(&draft_json("")).unwrap();
        draft.source = "   ".to_string();
        assert!(draft.validate().is_err());

        let mut draft: BusDraft = serde_json::from_str(&draft_json("")).unwrap();
        draft.fare_cents = -1;
        assert!(draft.validate().is_err());

        let mut draft: BusDraft = serde_json::from_str(&draft_json("")).unwrap();
        draft.total_seats = 0;
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_apply_clamps_available_when_capacity_shrinks() {
        let draft: BusDraft = serde_json::from_str(&draft_json("")).unwrap();
        let mut bus = draft.clone().validate().unwrap().into_bus(Uuid::new_v4(), "a", Utc::now());
        bus.available_seats = 30;

        let mut shrink = draft.validate().unwrap();
        shrink.total_seats = 20;
        shrink.apply_to(&mut bus);
        assert_eq!(bus.total_seats, 20);
        assert_eq!(bus.available_seats, 20);
        assert!(bus.seats_consistent());
    }
}
