use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::bus::Bus;

/// Optional route/date filters. Blank strings count as "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusSearchQuery {
    pub source: Option<String>,
    pub destination: Option<String>,
    #[serde(default, deserialize_with = "blank_date")]
    pub date: Option<NaiveDate>,
}

/// Query strings send `date=` when the date input is left empty.
fn blank_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl BusSearchQuery {
    /// Drops blank filters and trims the rest.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        Self {
            source: clean(&self.source),
            destination: clean(&self.destination),
            date: self.date,
        }
    }

    /// Bookable (`available_seats > 0`) and matching every filter given.
    pub fn matches(&self, bus: &Bus) -> bool {
        fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
            match needle {
                Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
                None => true,
            }
        }

        bus.available_seats > 0
            && contains_ci(&bus.source, &self.source)
            && contains_ci(&bus.destination, &self.destination)
            && self.date.map_or(true, |d| bus.travel_date == d)
    }

    /// Departure time ascending, then travel date, then id.
    pub fn sort(buses: &mut [Bus]) {
        buses.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then(a.travel_date.cmp(&b.travel_date))
                .then(a.id.cmp(&b.id))
        });
    }

    pub fn apply<'a, I>(&self, buses: I) -> Vec<Bus>
    where
        I: IntoIterator<Item = &'a Bus>,
    {
        let query = self.normalized();
        let mut found: Vec<Bus> = buses
            .into_iter()
            .filter(|bus| query.matches(bus))
            .cloned()
            .collect();
        Self::sort(&mut found);
        found
    }
}
