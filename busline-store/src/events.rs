use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use busline_shared::{ChangeEvent, ChangeFeed, ChangeSignal, ChangeSubscription, Table};

/// Destination that receives a copy of every change event.
#[async_trait]
pub trait ChangeSink: Send + Sync + 'static {
    async fn deliver(&self, event: &ChangeEvent) -> Result<(), String>;
}

/// Forwards both change channels to `sink` until the feed shuts down.
pub fn spawn_mirror<S: ChangeSink>(feed: &ChangeFeed, sink: Arc<S>) -> Vec<JoinHandle<()>> {
    [Table::Buses, Table::Bookings]
        .into_iter()
        .map(|table| {
            let sub = feed.subscribe(table);
            let sink = sink.clone();
            tokio::spawn(forward(sub, sink))
        })
        .collect()
}

async fn forward<S: ChangeSink>(mut sub: ChangeSubscription, sink: Arc<S>) {
    while let Some(signal) = sub.recv().await {
        match signal {
            ChangeSignal::Changed(event) => {
                if let Err(e) = sink.deliver(&event).await {
                    error!("Failed to mirror {} change {}: {}", event.table, event.record_id, e);
                }
            }
            ChangeSignal::Missed(n) => {
                warn!("Mirror for {} channel dropped {} events", sub.table(), n);
            }
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::EventProducer;

#[cfg(feature = "kafka")]
mod kafka {
    use super::*;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::info;

    #[derive(Clone)]
    pub struct EventProducer {
        producer: FutureProducer,
    }

    impl EventProducer {
        pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self { producer })
        }

        pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
            let record = FutureRecord::to(topic)
                .key(key)
                .payload(payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send message to {}: {}", topic, e);
                    Err(e)
                }
            }
        }
    }

    #[async_trait]
    impl ChangeSink for EventProducer {
        async fn deliver(&self, event: &ChangeEvent) -> Result<(), String> {
            let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
            self.publish(&event.table.topic(), &event.record_id.to_string(), &payload)
                .await
                .map_err(|e| e.to_string())
        }
    }
}
