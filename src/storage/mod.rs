//! Storage module: SQLite database, local cache, durable flags and
//! configuration.

pub mod cache;
pub mod config;
pub mod database;
pub mod flags;
pub mod schema;

pub use cache::{CacheEntry, CacheKey, LocalCache};
pub use config::{AppConfig, ConfigError};
pub use database::{Database, DatabaseError};
pub use flags::DurableFlags;
