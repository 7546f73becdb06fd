//! Cache
//!
//! Cliente Redis compartido por la reserva de vehículos y los eventos.

pub mod cache_config;
pub mod redis_client;

pub use cache_config::CacheConfig;
pub use redis_client::RedisClient;
