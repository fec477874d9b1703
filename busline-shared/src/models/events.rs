use std::fmt;
use uuid::Uuid;

/// Collections that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Buses,
    Bookings,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Buses => "buses",
            Table::Bookings => "bookings",
        }
    }

    /// Topic name used when mirroring the channel to a broker.
    pub fn topic(&self) -> String {
        format!("{}.changes", self.as_str())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record_id: Uuid,
    pub occurred_at: i64,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record_id: Uuid) -> Self {
        Self {
            table,
            kind,
            record_id,
            occurred_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let id = Uuid::new_v4();
        let event = ChangeEvent {
            table: Table::Bookings,
            kind: ChangeKind::Update,
            record_id: id,
            occurred_at: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["table"], "bookings");
        assert_eq!(json["kind"], "update");
        assert_eq!(json["record_id"], id.to_string());
        assert_eq!(Table::Buses.topic(), "buses.changes");
    }
}
