//! Async DNS resolver using hickory-dns.
//!
//! An alternative normal-resolution backend for the transport: fully async,
//! reads the system configuration, and keeps its own connection pool to the
//! upstream servers.

use super::{ip_literal, Addrs, Name, Resolve, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use std::{io, net::SocketAddr, sync::Arc};

/// Async DNS resolver backed by hickory-dns.
///
/// ```rust,ignore
/// use httpdns::dns::{HickoryResolver, Name, Resolve};
///
/// let resolver = HickoryResolver::new();
/// let addrs = resolver.resolve(Name::new("example.com")).await?;
/// ```
#[derive(Clone)]
pub struct HickoryResolver {
    resolver: Arc<TokioResolver>,
}

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver").finish_non_exhaustive()
    }
}

impl HickoryResolver {
    /// Resolver using the system DNS configuration, or hickory's defaults
    /// when that cannot be read.
    pub fn new() -> Self {
        let mut builder = match TokioResolver::builder_tokio() {
            Ok(builder) => {
                tracing::debug!("Using system DNS configuration");
                builder
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to read system DNS config, using defaults"
                );
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
            }
        };

        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        Self {
            resolver: Arc::new(builder.build()),
        }
    }

    /// Resolver with an explicit upstream configuration.
    pub fn with_config(config: ResolverConfig) -> Self {
        let mut builder =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        Self {
            resolver: Arc::new(builder.build()),
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.resolver.clone();
        Box::pin(async move {
            let domain = name.as_str();
            if let Some(ip) = ip_literal(domain) {
                return Ok(Box::new(std::iter::once(SocketAddr::new(ip, 0))) as Addrs);
            }

            tracing::debug!(domain = %domain, "resolving via hickory-dns");

            let lookup = resolver.lookup_ip(domain).await.map_err(|e| {
                tracing::debug!(domain = %domain, error = %e, "hickory-dns lookup failed");
                NetError::dns_failed(domain, io::Error::new(io::ErrorKind::NotFound, e.to_string()))
            })?;

            let addrs: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, 0)).collect();

            if addrs.is_empty() {
                return Err(NetError::dns_failed(
                    domain,
                    io::Error::new(io::ErrorKind::NotFound, "No addresses returned"),
                ));
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "hickory-dns resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}
