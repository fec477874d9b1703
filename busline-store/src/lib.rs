pub mod app_config;
pub mod booking_repo;
pub mod bus_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod profile_repo;
pub mod redis_repo;

pub use booking_repo::PgBookingRepository;
pub use bus_repo::PgBusRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use profile_repo::PgProfileRepository;
pub use redis_repo::RedisClient;

pub(crate) fn storage(err: sqlx::Error) -> busline_core::CoreError {
    busline_core::CoreError::StorageError(err.to_string())
}
