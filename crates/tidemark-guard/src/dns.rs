//! Hostname resolution with a short-TTL cache.
//!
//! The cache bounds the TOCTOU window between the guard's check and the
//! fetcher's own resolution: entries live 5 seconds, and the map is swept
//! opportunistically once it grows past 500 hosts.

use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::trace;

const DNS_TTL: Duration = Duration::from_secs(5);
const SWEEP_THRESHOLD: usize = 500;

struct Entry {
    resolved_at: Instant,
    addrs: Option<Vec<IpAddr>>,
}

/// Concurrent resolver cache. Last-writer-wins on concurrent resolution of
/// the same host; both writers hold equally fresh data.
pub struct DnsCache {
    entries: DashMap<String, Entry>,
}

impl Default for DnsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Resolve `host` over both address families. Returns `None` when the
    /// lookup itself failed; the caller treats that as "unknown", not as a
    /// block.
    pub async fn resolve(&self, host: &str) -> Option<Vec<IpAddr>> {
        if let Some(entry) = self.entries.get(host) {
            if entry.resolved_at.elapsed() < DNS_TTL {
                trace!(host, "dns cache hit");
                return entry.addrs.clone();
            }
        }

        let addrs = match tokio::net::lookup_host((host, 80)).await {
            Ok(iter) => Some(iter.map(|sa| sa.ip()).collect::<Vec<_>>()),
            Err(_) => None,
        };

        self.sweep_if_needed();
        self.entries.insert(
            host.to_string(),
            Entry {
                resolved_at: Instant::now(),
                addrs: addrs.clone(),
            },
        );

        addrs
    }

    fn sweep_if_needed(&self) {
        if self.entries.len() <= SWEEP_THRESHOLD {
            return;
        }
        self.entries
            .retain(|_, entry| entry.resolved_at.elapsed() < DNS_TTL);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&self, host: &str, addrs: Option<Vec<IpAddr>>, age: Duration) {
        self.entries.insert(
            host.to_string(),
            Entry {
                resolved_at: Instant::now() - age,
                addrs,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cached_entries_are_served_within_ttl() {
        let cache = DnsCache::new();
        let canned: Vec<IpAddr> = vec!["93.184.216.34".parse().unwrap()];
        cache.insert_for_test("cached.test", Some(canned.clone()), Duration::ZERO);

        let got = cache.resolve("cached.test").await;
        assert_eq!(got, Some(canned));
    }

    #[tokio::test]
    async fn negative_results_are_cached_too() {
        let cache = DnsCache::new();
        cache.insert_for_test("nxdomain.test", None, Duration::ZERO);
        assert_eq!(cache.resolve("nxdomain.test").await, None);
    }

    #[test]
    fn sweep_drops_expired_entries_past_threshold() {
        let cache = DnsCache::new();
        for i in 0..SWEEP_THRESHOLD + 10 {
            cache.insert_for_test(
                &format!("host{i}.test"),
                None,
                Duration::from_secs(30),
            );
        }
        cache.sweep_if_needed();
        assert_eq!(cache.len(), 0);
    }
}
