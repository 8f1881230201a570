//! Two-layer caching, fingerprint keys, tier TTLs, and the fixed-window
//! rate limiter.
//!
//! The primary layer is Redis; the secondary is an in-process LRU bounded
//! at 200 entries. Reads return the first hit tagged with its source;
//! writes populate both. When Redis is down the secondary keeps serving.

pub mod keys;
pub mod layered;
pub mod memory;
pub mod rate_limit;
pub mod redis_storage;
pub mod ttl;

pub use keys::{conversion_key, extract_key, fingerprint, normalize_url};
pub use layered::{CacheSource, LayeredCache};
pub use memory::MemoryCache;
pub use rate_limit::{RateDecision, RateLimiter};
pub use redis_storage::RedisStorage;
pub use ttl::{tier_ttl, EXTRACT_TTL};

use async_trait::async_trait;
use std::time::Duration;
use tidemark_types::Result;

/// Storage contract shared by both layers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}
