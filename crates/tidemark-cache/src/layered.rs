//! Composition of the distributed and in-process layers.

use crate::{CacheStorage, MemoryCache, RedisStorage};
use std::time::Duration;
use tracing::{debug, warn};

/// Which layer served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Primary,
    Secondary,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Two-layer cache. Reads try the primary first; a primary failure is
/// logged and the secondary still serves. Writes populate both layers.
pub struct LayeredCache {
    primary: Option<RedisStorage>,
    secondary: MemoryCache,
}

impl LayeredCache {
    pub fn new(primary: Option<RedisStorage>) -> Self {
        Self {
            primary,
            secondary: MemoryCache::new(),
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<(Vec<u8>, CacheSource)> {
        if let Some(primary) = &self.primary {
            match primary.get(key).await {
                Ok(Some(value)) => return Some((value, CacheSource::Primary)),
                Ok(None) => {}
                Err(err) => warn!(key, %err, "primary cache read failed"),
            }
        }
        match self.secondary.get(key).await {
            Ok(Some(value)) => Some((value, CacheSource::Secondary)),
            _ => None,
        }
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        if let Some(primary) = &self.primary {
            if let Err(err) = primary.set(key, value, ttl).await {
                warn!(key, %err, "primary cache write failed");
            }
        }
        if let Err(err) = self.secondary.set(key, value, ttl).await {
            warn!(key, %err, "secondary cache write failed");
        }
        debug!(key, ttl_s = ttl.as_secs(), "cached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_from_secondary_without_primary() {
        let cache = LayeredCache::new(None);
        cache.set("k", b"v", Duration::from_secs(30)).await;
        let (value, source) = cache.get("k").await.unwrap();
        assert_eq!(value, b"v");
        assert_eq!(source, CacheSource::Secondary);
    }

    #[tokio::test]
    async fn miss_is_none() {
        let cache = LayeredCache::new(None);
        assert!(cache.get("absent").await.is_none());
    }

    #[test]
    fn source_labels() {
        assert_eq!(CacheSource::Primary.as_str(), "primary");
        assert_eq!(CacheSource::Secondary.as_str(), "secondary");
    }
}
