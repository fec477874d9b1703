use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use busline_api::{app, metrics::Metrics, state::{AppState, AuthConfig}};
use busline_core::ReservationService;
use busline_shared::ChangeFeed;
use busline_store::{
    events, DbClient, MemoryStore, PgBookingRepository, PgBusRepository, PgProfileRepository,
    RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "busline_api=debug,busline_core=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = busline_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Busline API on port {}", config.server.port);

    let feed = ChangeFeed::new(config.feed.capacity);

    let service = if config.database.url.is_empty() {
        tracing::warn!("No database configured; using the in-memory store");
        let store = MemoryStore::new();
        ReservationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            feed.clone(),
        )
    } else {
        let db = DbClient::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to Postgres")?;
        if config.database.run_migrations {
            db.migrate().await.context("Failed to run migrations")?;
        }
        ReservationService::new(
            Arc::new(PgBusRepository::new(db.pool.clone())),
            Arc::new(PgBookingRepository::new(db.pool.clone())),
            Arc::new(PgProfileRepository::new(db.pool.clone())),
            feed.clone(),
        )
    };

    // Redis Connection
    let redis = match config.redis.url.as_deref() {
        Some(url) => Some(Arc::new(RedisClient::new(url).context("Invalid Redis URL")?)),
        None => {
            tracing::info!("Rate limiting disabled (no Redis configured)");
            None
        }
    };

    start_kafka_mirror(&feed, config.kafka.brokers.as_deref())?;

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    events::spawn_mirror(&feed, metrics.clone());

    let app_state = AppState {
        service,
        redis,
        rate_limit: config.rate_limit.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            admin_key: config.auth.admin_key.clone().filter(|k| !k.is_empty()),
        },
        metrics,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    ).await?;

    Ok(())
}

#[cfg(feature = "kafka")]
fn start_kafka_mirror(feed: &ChangeFeed, brokers: Option<&str>) -> anyhow::Result<()> {
    if let Some(brokers) = brokers {
        let producer = events::EventProducer::new(brokers).context("Failed to create Kafka producer")?;
        events::spawn_mirror(feed, Arc::new(producer));
        tracing::info!("Mirroring change feed to Kafka at {}", brokers);
    }
    Ok(())
}

#[cfg(not(feature = "kafka"))]
fn start_kafka_mirror(_feed: &ChangeFeed, brokers: Option<&str>) -> anyhow::Result<()> {
    if brokers.is_some() {
        tracing::warn!("kafka.brokers is set but this build lacks the `kafka` feature");
    }
    Ok(())
}
