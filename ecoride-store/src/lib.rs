pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod reference_repo;
pub mod trip_repo;

pub use app_config::Config;
pub use booking_repo::StoreBookingRepository;
pub use database::DbClient;
pub use events::EventPublisher;
pub use memory::InMemoryStore;
pub use redis_repo::RedisClient;
pub use reference_repo::StoreReferenceRepository;
pub use trip_repo::StoreTripRepository;
