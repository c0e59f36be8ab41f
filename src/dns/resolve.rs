//! Core DNS resolution types and traits.
//!
//! [`Resolve`] is the resolution provider interface: it turns a hostname
//! into zero or more addresses. Both the HTTPDNS provider and the system
//! fallback used for un-substituted connections implement it.

use crate::base::neterror::NetError;
use std::{
    collections::HashMap, fmt, future::Future, net::IpAddr, net::SocketAddr, pin::Pin, sync::Arc,
    time::Duration,
};

/// A domain name to resolve into IP addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// View the hostname as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Alias for an `Iterator` trait object over `SocketAddr`.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Alias for the `Future` type returned by a DNS resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Addresses for one name, with the lifetime the provider reported for
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Answer {
    pub addrs: Vec<IpAddr>,
    pub ttl: Option<Duration>,
}

/// `Future` returned by [`Resolve::resolve_answer`].
pub type Answering = Pin<Box<dyn Future<Output = Result<Answer, NetError>> + Send>>;

/// Trait for DNS resolution.
///
/// Implementations must be thread-safe. The returned addresses carry port
/// 0; callers set the port of the service they connect to. An empty
/// iterator means "no answer", which callers treat like an error: fall
/// back, never fail the request because of it.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;

    /// Resolve `name`, keeping the answer's TTL when the provider reports
    /// one. Providers without TTLs answer with `ttl: None`.
    fn resolve_answer(&self, name: Name) -> Answering {
        let resolving = self.resolve(name);
        Box::pin(async move {
            let addrs = resolving.await?.map(|a| a.ip()).collect();
            Ok(Answer { addrs, ttl: None })
        })
    }
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }

    fn resolve_answer(&self, name: Name) -> Answering {
        (**self).resolve_answer(name)
    }
}

/// Parse `host` as an IP literal, accepting bracketed IPv6 (`[::1]`).
pub fn ip_literal(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
}

/// Resolver answering from a fixed host table.
///
/// Unknown hosts resolve to an empty answer. Useful for tests and for
/// pinning a handful of hosts without any lookup service.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    table: Arc<HashMap<String, Vec<IpAddr>>>,
}

impl StaticResolver {
    pub fn new<I, H>(entries: I) -> Self
    where
        I: IntoIterator<Item = (H, Vec<IpAddr>)>,
        H: Into<String>,
    {
        let table = entries
            .into_iter()
            .map(|(host, ips)| (host.into().to_ascii_lowercase(), ips))
            .collect();
        Self {
            table: Arc::new(table),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let addrs: Vec<SocketAddr> = self
            .table
            .get(&name.as_str().to_ascii_lowercase())
            .map(|ips| ips.iter().map(|ip| SocketAddr::new(*ip, 0)).collect())
            .unwrap_or_default();
        Box::pin(std::future::ready(Ok(Box::new(addrs.into_iter()) as Addrs)))
    }
}
