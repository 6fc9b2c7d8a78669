//! Cache layer for the Tessera multi-tenant platform.
//!
//! Provides a unified [`CacheStore`] interface over an in-memory backend and
//! a Redis backend, plus typed helpers for JSON payloads. Tenant lookups and
//! connection strings are cached through this layer; its consumers treat the
//! cache as a side effect and must keep working when it is down.
//!
//! # Features
//!
//! - `redis` - Enable Redis cache support (enabled by default)
//!
//! # Examples
//!
//! ```
//! use tessera_cache::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let cache = MemoryCache::new();
//!
//!     cache
//!         .set_json("tenant_identifier_acme", "{\"id\":1}".to_string(), Some(Duration::from_secs(1800)))
//!         .await?;
//!     assert!(cache.exists("tenant_identifier_acme").await?);
//!
//!     cache.delete("tenant_identifier_acme").await?;
//!     assert_eq!(cache.get_json("tenant_identifier_acme").await?, None);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod helpers;
pub mod memory;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use traits::CacheStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
