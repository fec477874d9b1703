use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use busline_shared::{ChangeFeed, ChangeSignal, ChangeSubscription, Table};

use crate::booking::BookingDetails;
use crate::bus::{Bus, BusOrder};
use crate::repository::{BookingRepository, BusRepository};
use crate::CoreResult;

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub buses: Vec<Bus>,
    pub bookings: Vec<BookingDetails>,
    pub last_refreshed: DateTime<Utc>,
}

/// Live read-only mirror of every bus and booking.
///
/// Mounting subscribes to both change channels; every notification re-fetches
/// the whole collection it names. Dropping (or [`MonitorView::unmount`])
/// releases both subscriptions.
pub struct MonitorView {
    buses_repo: Arc<dyn BusRepository>,
    bookings_repo: Arc<dyn BookingRepository>,
    bus_changes: ChangeSubscription,
    booking_changes: ChangeSubscription,
    snapshot: MonitorSnapshot,
}

impl MonitorView {
    pub async fn mount(
        buses_repo: Arc<dyn BusRepository>,
        bookings_repo: Arc<dyn BookingRepository>,
        feed: &ChangeFeed,
    ) -> CoreResult<Self> {
        // Subscribe before the first fetch so no change slips in between.
        let bus_changes = feed.subscribe(Table::Buses);
        let booking_changes = feed.subscribe(Table::Bookings);

        let buses = buses_repo.list_buses(BusOrder::Newest).await?;
        let bookings = bookings_repo.list_all().await?;
        info!(buses = buses.len(), bookings = bookings.len(), "Monitor mounted");

        Ok(Self {
            buses_repo,
            bookings_repo,
            bus_changes,
            booking_changes,
            snapshot: MonitorSnapshot {
                buses,
                bookings,
                last_refreshed: Utc::now(),
            },
        })
    }

    pub fn snapshot(&self) -> &MonitorSnapshot {
        &self.snapshot
    }

    /// Waits for the next change on either channel and re-fetches that
    /// collection. `None` once the feed has shut down.
    pub async fn next_refresh(&mut self) -> Option<CoreResult<Table>> {
        let (signal, table) = tokio::select! {
            signal = self.bus_changes.recv() => (signal, Table::Buses),
            signal = self.booking_changes.recv() => (signal, Table::Bookings),
        };
        let table = Self::table_for(signal, table)?;
        Some(self.refresh(table).await.map(|_| table))
    }

    fn table_for(signal: Option<ChangeSignal>, table: Table) -> Option<Table> {
        match signal? {
            ChangeSignal::Changed(event) => {
                debug!(table = %table, kind = ?event.kind, record = %event.record_id, "Change received");
            }
            ChangeSignal::Missed(n) => {
                debug!(table = %table, missed = n, "Monitor lagged, refetching");
            }
        }
        Some(table)
    }

    pub async fn refresh(&mut self, table: Table) -> CoreResult<()> {
        match table {
            Table::Buses => {
                self.snapshot.buses = self.buses_repo.list_buses(BusOrder::Newest).await?;
            }
            Table::Bookings => {
                self.snapshot.bookings = self.bookings_repo.list_all().await?;
            }
        }
        self.snapshot.last_refreshed = Utc::now();
        Ok(())
    }

    pub fn unmount(self) {
        self.bus_changes.unsubscribe();
        self.booking_changes.unsubscribe();
        info!("Monitor unmounted");
    }
}
