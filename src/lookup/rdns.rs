use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

use crate::lookup::sanitize_display;

/// How long a lookup result (including a miss) is reused
const CACHE_TTL: Duration = Duration::from_secs(3600);
/// Per-query timeout; lookups must not hold up a trace for long
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// DNS cache entry
struct CacheEntry {
    hostname: Option<String>,
    cached_at: Instant,
}

/// Reverse DNS lookups with caching
pub struct DnsLookup {
    resolver: TokioAsyncResolver,
    cache: RwLock<HashMap<IpAddr, CacheEntry>>,
    cache_ttl: Duration,
}

impl DnsLookup {
    pub fn new() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!(error = %e, "system DNS config unavailable, using default resolver");
                let mut opts = ResolverOpts::default();
                opts.timeout = LOOKUP_TIMEOUT;
                opts.attempts = 1;
                TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
            }
        };

        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: CACHE_TTL,
        }
    }

    /// Lookup reverse DNS for an IP, using cache
    ///
    /// All PTR names are returned joined with `", "`, trailing dots removed.
    pub async fn reverse_lookup(&self, ip: IpAddr) -> Option<String> {
        // Check cache first
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(&ip) {
                if entry.cached_at.elapsed() < self.cache_ttl {
                    return entry.hostname.clone();
                }
            }
        }

        let lookup = tokio::time::timeout(LOOKUP_TIMEOUT * 2, self.resolver.reverse_lookup(ip)).await;
        let hostname = match lookup {
            Ok(Ok(lookup)) => join_names(lookup.iter().map(|name| name.to_string())),
            Ok(Err(e)) => {
                trace!(%ip, error = %e, "reverse lookup failed");
                None
            }
            Err(_) => {
                trace!(%ip, "reverse lookup timed out");
                None
            }
        };

        // Cache result
        {
            let mut cache = self.cache.write();
            cache.insert(
                ip,
                CacheEntry {
                    hostname: hostname.clone(),
                    cached_at: Instant::now(),
                },
            );
        }

        hostname
    }

    /// Host name for a hop, empty when nothing resolved
    pub async fn host_for(&self, ip: IpAddr) -> String {
        self.reverse_lookup(ip).await.unwrap_or_default()
    }
}

impl Default for DnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// Join PTR names for display: trailing dots trimmed, empty names dropped
fn join_names(names: impl IntoIterator<Item = String>) -> Option<String> {
    let names: Vec<String> = names
        .into_iter()
        .map(|name| sanitize_display(name.trim_end_matches('.')))
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn seed(dns: &DnsLookup, ip: IpAddr, hostname: Option<&str>) {
        dns.cache.write().insert(
            ip,
            CacheEntry {
                hostname: hostname.map(str::to_string),
                cached_at: Instant::now(),
            },
        );
    }

    #[test]
    fn test_join_names() {
        let names = vec!["core1.example.net.".to_string(), "alias.example.net.".to_string()];
        assert_eq!(
            join_names(names).as_deref(),
            Some("core1.example.net, alias.example.net")
        );
        assert_eq!(join_names(vec![".".to_string()]), None);
        assert_eq!(join_names(Vec::new()), None);
    }

    #[tokio::test]
    async fn test_cached_name_is_reused() {
        let dns = DnsLookup::new();
        let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));
        seed(&dns, ip, Some("core1.example.net"));

        assert_eq!(dns.reverse_lookup(ip).await.as_deref(), Some("core1.example.net"));
        assert_eq!(dns.host_for(ip).await, "core1.example.net");
        assert_eq!(dns.cache.read().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_miss_gives_empty_host() {
        let dns = DnsLookup::new();
        let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 11));
        seed(&dns, ip, None);

        assert_eq!(dns.reverse_lookup(ip).await, None);
        assert_eq!(dns.host_for(ip).await, "");
    }

    #[tokio::test]
    #[ignore = "requires a working resolver"]
    async fn test_loopback_lookup_is_cached() {
        let dns = DnsLookup::new();
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let first = dns.reverse_lookup(ip).await;
        assert!(first.is_some());
        assert!(dns.cache.read().contains_key(&ip));
        assert_eq!(dns.reverse_lookup(ip).await, first);
    }
}
