//! TTL cache in front of any [`Resolve`] implementation.
//!
//! Only non-empty answers are cached. A failed or empty lookup is retried
//! the next time the host is asked for. An answer lives for the cache TTL,
//! or for the provider's TTL when that is shorter.

use super::{Addrs, Answer, Name, Resolve, Resolving};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lifetime of a cached answer.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    addrs: Vec<IpAddr>,
    expires: Instant,
}

/// Caching wrapper with non-blocking `peek` and background `prefetch`.
pub struct CachedResolver<R> {
    inner: Arc<R>,
    ttl: Duration,
    entries: Arc<DashMap<String, CacheEntry>>,
    // Hosts with a prefetch currently running.
    pending: Arc<DashMap<String, ()>>,
}

impl<R> Clone for CachedResolver<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            ttl: self.ttl,
            entries: self.entries.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<R> std::fmt::Debug for CachedResolver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedResolver")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<R: Resolve + 'static> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(inner: R, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            ttl,
            entries: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached, unexpired answer for `host`, without any lookup.
    pub fn peek(&self, host: &str) -> Option<Vec<IpAddr>> {
        let key = host.to_ascii_lowercase();
        let now = Instant::now();
        {
            let entry = self.entries.get(&key)?;
            if entry.expires > now {
                return Some(entry.addrs.clone());
            }
        }
        self.entries.remove_if(&key, |_, e| e.expires <= now);
        None
    }

    /// Start a background lookup for `host` unless one is already running.
    /// Requires a Tokio runtime.
    pub fn prefetch(&self, host: &str) {
        let key = host.to_ascii_lowercase();
        if self.pending.insert(key.clone(), ()).is_some() {
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            match this.lookup_and_store(&key).await {
                Some(count) => tracing::debug!(host = %key, count, "prefetch complete"),
                None => tracing::debug!(host = %key, "prefetch returned no answer"),
            }
            this.pending.remove(&key);
        });
    }

    /// Seed the cache directly.
    pub fn insert(&self, host: &str, addrs: Vec<IpAddr>) {
        self.insert_with_ttl(host, addrs, None);
    }

    /// Seed the cache with an answer the provider says is valid for `ttl`.
    /// The entry never outlives the cache TTL.
    pub fn insert_with_ttl(&self, host: &str, addrs: Vec<IpAddr>, ttl: Option<Duration>) {
        if addrs.is_empty() {
            return;
        }
        let ttl = ttl.map_or(self.ttl, |ttl| ttl.min(self.ttl));
        self.entries.insert(
            host.to_ascii_lowercase(),
            CacheEntry {
                addrs,
                expires: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, host: &str) {
        self.entries.remove(&host.to_ascii_lowercase());
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn lookup_and_store(&self, key: &str) -> Option<usize> {
        let Answer { addrs, ttl } = match self.inner.resolve_answer(Name::new(key)).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::debug!(host = %key, error = %e, "lookup failed, not cached");
                return None;
            }
        };
        if addrs.is_empty() {
            return None;
        }
        let count = addrs.len();
        self.insert_with_ttl(key, addrs, ttl);
        Some(count)
    }
}

impl<R: Resolve + 'static> Resolve for CachedResolver<R> {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(ips) = self.peek(name.as_str()) {
            tracing::trace!(host = %name, "resolver cache hit");
            let addrs: Vec<SocketAddr> = ips.into_iter().map(|ip| SocketAddr::new(ip, 0)).collect();
            return Box::pin(std::future::ready(Ok(Box::new(addrs.into_iter()) as Addrs)));
        }

        let this = self.clone();
        Box::pin(async move {
            let key = name.as_str().to_ascii_lowercase();
            let Answer { addrs, ttl } = this.inner.resolve_answer(name).await?;
            this.insert_with_ttl(&key, addrs.clone(), ttl);
            let addrs: Vec<SocketAddr> = addrs.into_iter().map(|ip| SocketAddr::new(ip, 0)).collect();
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}
