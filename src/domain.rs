//! Effective (registrable) domain lookup.
//!
//! Backed by the public suffix list bundled with the `addr` crate. Hosts
//! that are not valid domain names, IP literals and bare public suffixes
//! are returned unchanged. Results are memoized in a process-wide LRU
//! cache.

use std::net::IpAddr;
use std::num::NonZeroUsize;

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::url::UrlParser;

/// Capacity of the effective-domain cache
pub const DOMAIN_CACHE_SIZE: usize = 4096;

static DOMAIN_CACHE: Lazy<Mutex<LruCache<String, String>>> = Lazy::new(|| {
    let capacity = NonZeroUsize::new(DOMAIN_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
});

/// Registrable domain of a hostname (`sub.example.co.uk` → `example.co.uk`).
///
/// IP literals and single-label hosts are returned unchanged (lowercased).
pub fn effective_domain(hostname: &str) -> String {
    let host = hostname.trim_end_matches('.').to_ascii_lowercase();

    let mut cache = DOMAIN_CACHE.lock();
    if let Some(cached) = cache.get(&host) {
        return cached.clone();
    }
    let domain = compute_effective_domain(&host);
    cache.put(host, domain.clone());
    domain
}

fn compute_effective_domain(host: &str) -> String {
    if host.is_empty() || host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }
    match addr::parse_domain_name(host) {
        Ok(name) => name.root().unwrap_or(host).to_string(),
        Err(e) => {
            debug!(host = host, error = ?e, "not a domain name, using host as is");
            host.to_string()
        }
    }
}

/// Effective domain of a url's hostname
pub fn url_domain(url: &str) -> String {
    effective_domain(UrlParser::new(url).hostname())
}

/// Whether two urls share the same effective domain
pub fn is_same_domain(a: &str, b: &str) -> bool {
    url_domain(a) == url_domain(b)
}
