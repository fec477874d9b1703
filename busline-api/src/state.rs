use std::sync::Arc;

use busline_core::ReservationService;
use busline_store::app_config::RateLimitConfig;
use busline_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub admin_key: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub service: ReservationService,
    /// Rate limiting is off when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
}
