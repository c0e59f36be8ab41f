//! Ready-made policy backed by an HTTPDNS provider.

use super::{InterceptionPolicy, Lookup};
use crate::dns::{ip_literal, CachedResolver, HttpDnsResolver, Name, Resolve, DEFAULT_CACHE_TTL};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

type SharedCache = CachedResolver<Arc<dyn Resolve>>;

/// Intercepts every http/https URL except bypassed hosts and IP literals,
/// and substitutes the first address the provider returns.
///
/// In blocking mode a lookup waits for the provider, bounded by the lookup
/// timeout. In async mode only cached answers are used; a miss schedules a
/// background refresh and the current request resolves normally.
///
/// ```rust,ignore
/// use httpdns::policy::HttpDnsPolicy;
///
/// let policy = HttpDnsPolicy::builder()
///     .bypass_host("login.example.com")
///     .host_replacement("cdn.example.com", "www.example.com")
///     .async_lookup(true)
///     .build();
/// ```
#[derive(Clone)]
pub struct HttpDnsPolicy {
    cache: SharedCache,
    lookup_timeout: Duration,
    async_lookup: bool,
    bypass_hosts: Arc<HashSet<String>>,
    host_replacements: Arc<HashMap<String, String>>,
}

impl std::fmt::Debug for HttpDnsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDnsPolicy")
            .field("cache", &self.cache)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("async_lookup", &self.async_lookup)
            .field("bypass_hosts", &self.bypass_hosts)
            .field("host_replacements", &self.host_replacements)
            .finish()
    }
}

impl HttpDnsPolicy {
    pub fn builder() -> HttpDnsPolicyBuilder {
        HttpDnsPolicyBuilder::default()
    }

    /// The provider cache, for pre-warming or inspection.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub fn is_async(&self) -> bool {
        self.async_lookup
    }

    fn is_bypassed(&self, host: &str) -> bool {
        self.bypass_hosts.contains(host)
    }
}

impl InterceptionPolicy for HttpDnsPolicy {
    fn should_intercept(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        ip_literal(&host).is_none() && !self.is_bypassed(&host)
    }

    fn resolved_ip(&self, domain: &str) -> Lookup {
        let cache = self.cache.clone();

        if self.async_lookup {
            let hit = cache.peek(domain).and_then(|ips| ips.first().copied());
            if hit.is_none() {
                tracing::debug!(host = %domain, "cache miss, refreshing in background");
                cache.prefetch(domain);
            }
            return Box::pin(std::future::ready(hit));
        }

        let timeout = self.lookup_timeout;
        let name = Name::new(domain);
        Box::pin(async move {
            match tokio::time::timeout(timeout, cache.resolve(name.clone())).await {
                Ok(Ok(mut addrs)) => addrs.next().map(|a| a.ip()),
                Ok(Err(e)) => {
                    tracing::debug!(host = %name, error = %e, "provider lookup failed");
                    None
                }
                Err(_) => {
                    tracing::debug!(host = %name, "provider lookup timed out");
                    None
                }
            }
        })
    }

    fn replacement_host(&self, original_host: &str) -> Option<String> {
        self.host_replacements
            .get(&original_host.to_ascii_lowercase())
            .cloned()
    }
}

/// Builder for [`HttpDnsPolicy`].
#[derive(Default)]
pub struct HttpDnsPolicyBuilder {
    resolver: Option<Arc<dyn Resolve>>,
    cache_ttl: Option<Duration>,
    lookup_timeout: Option<Duration>,
    async_lookup: bool,
    bypass_hosts: HashSet<String>,
    host_replacements: HashMap<String, String>,
}

impl HttpDnsPolicyBuilder {
    /// Resolution provider. Defaults to the public D+ endpoint.
    pub fn resolver<R: Resolve + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    pub fn async_lookup(mut self, enabled: bool) -> Self {
        self.async_lookup = enabled;
        self
    }

    /// Never intercept `host`.
    pub fn bypass_host(mut self, host: impl Into<String>) -> Self {
        self.bypass_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    pub fn bypass_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bypass_hosts
            .extend(hosts.into_iter().map(|h| h.into().to_ascii_lowercase()));
        self
    }

    /// Use `replacement` as the logical host whenever `original` is requested.
    pub fn host_replacement(mut self, original: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.host_replacements
            .insert(original.into().to_ascii_lowercase(), replacement.into());
        self
    }

    pub fn build(self) -> HttpDnsPolicy {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(HttpDnsResolver::default()));
        let cache = CachedResolver::with_ttl(resolver, self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL));

        HttpDnsPolicy {
            cache,
            lookup_timeout: self.lookup_timeout.unwrap_or(DEFAULT_LOOKUP_TIMEOUT),
            async_lookup: self.async_lookup,
            bypass_hosts: Arc::new(self.bypass_hosts),
            host_replacements: Arc::new(self.host_replacements),
        }
    }
}
