use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::models::events::{ChangeEvent, Table};

/// Per-table broadcast channels for row change notifications.
#[derive(Clone)]
pub struct ChangeFeed {
    buses: broadcast::Sender<ChangeEvent>,
    bookings: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (buses, _) = broadcast::channel(capacity);
        let (bookings, _) = broadcast::channel(capacity);
        Self { buses, bookings }
    }

    fn sender(&self, table: Table) -> &broadcast::Sender<ChangeEvent> {
        match table {
            Table::Buses => &self.buses,
            Table::Bookings => &self.bookings,
        }
    }

    /// Returns the number of subscribers the event reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let table = event.table;
        match self.sender(table).send(event) {
            Ok(n) => n,
            Err(_) => {
                debug!("No subscribers on {} channel", table);
                0
            }
        }
    }

    pub fn subscribe(&self, table: Table) -> ChangeSubscription {
        ChangeSubscription {
            table,
            rx: self.sender(table).subscribe(),
        }
    }

    pub fn subscriber_count(&self, table: Table) -> usize {
        self.sender(table).receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(100)
    }
}

/// What a subscriber observed on its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSignal {
    Changed(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped.
    Missed(u64),
}

/// A live subscription to one table's channel. Dropping it unsubscribes.
pub struct ChangeSubscription {
    table: Table,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    pub fn table(&self) -> Table {
        self.table
    }

    /// Waits for the next signal. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeSignal> {
        match self.rx.recv().await {
            Ok(event) => Some(ChangeSignal::Changed(event)),
            Err(RecvError::Lagged(n)) => Some(ChangeSignal::Missed(n)),
            Err(RecvError::Closed) => None,
        }
    }

    pub fn unsubscribe(self) {
        debug!("Unsubscribed from {} channel", self.table);
    }
}
