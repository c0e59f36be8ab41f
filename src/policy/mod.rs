//! Interception policy.
//!
//! A policy answers four questions about a URL: should the engine handle it
//! at all, should it connect to a substituted IP, which IP, and which
//! logical hostname stands in for the original one. Policies are pure
//! decision objects shared across tasks.

mod httpdns;

pub use httpdns::{HttpDnsPolicy, HttpDnsPolicyBuilder};

use crate::base::neterror::NetError;
use crate::dns::ip_literal;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use url::Url;

/// Future returned by [`InterceptionPolicy::resolved_ip`].
pub type Lookup = Pin<Box<dyn Future<Output = Option<IpAddr>> + Send>>;

/// Decision interface consulted for every request and every redirect hop.
pub trait InterceptionPolicy: Send + Sync {
    /// Whether the engine handles this URL. `false` leaves the request to
    /// the caller's normal stack, which is how a resolution provider keeps
    /// its own lookups out of the engine.
    fn should_intercept(&self, url: &Url) -> bool;

    /// Whether an intercepted URL connects to a substituted IP. When
    /// `false` the request still flows through the engine (cookies, event
    /// shape) but is resolved normally.
    fn should_use_direct_ip(&self, url: &Url) -> bool {
        self.should_intercept(url)
    }

    /// IP to connect to for `domain`. `None` means no substitution is
    /// available right now and the hop falls back to normal resolution.
    fn resolved_ip(&self, domain: &str) -> Lookup;

    /// Logical hostname used instead of `original_host` for the `Host`
    /// header, cookies and TLS identity.
    fn replacement_host(&self, _original_host: &str) -> Option<String> {
        None
    }
}

/// Where one hop connects, and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Host from the request URL.
    pub host: String,
    /// Substituted address; `None` means normal resolution.
    pub addr: Option<IpAddr>,
    pub replacement_host: Option<String>,
}

impl ResolvedTarget {
    /// Target that connects to `host` through normal resolution.
    pub fn direct(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            addr: None,
            replacement_host: None,
        }
    }

    pub fn with_addr(mut self, addr: IpAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    pub fn with_replacement_host(mut self, host: impl Into<String>) -> Self {
        self.replacement_host = Some(host.into());
        self
    }

    /// Name used for every identity computation.
    pub fn logical_host(&self) -> &str {
        self.replacement_host.as_deref().unwrap_or(&self.host)
    }

    pub fn is_substituted(&self) -> bool {
        self.addr.is_some()
    }
}

/// Consult `policy` for one hop to `url`.
///
/// A provider with no answer is not an error: the target simply carries no
/// address. IP-literal hosts are never substituted.
pub async fn resolve_target(
    policy: &dyn InterceptionPolicy,
    url: &Url,
) -> Result<ResolvedTarget, NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?.to_ascii_lowercase();

    let mut target = ResolvedTarget::direct(host.clone());
    if let Some(replacement) = policy.replacement_host(&host) {
        target.replacement_host = Some(replacement);
    }

    if ip_literal(&host).is_some() {
        return Ok(target);
    }
    if !policy.should_intercept(url) || !policy.should_use_direct_ip(url) {
        tracing::debug!(host = %host, "no IP substitution for this URL");
        return Ok(target);
    }

    match policy.resolved_ip(&host).await {
        Some(ip) => {
            tracing::debug!(host = %host, ip = %ip, "substituting resolved IP");
            target.addr = Some(ip);
        }
        None => {
            tracing::debug!(host = %host, "no resolution available, falling back to normal DNS");
        }
    }
    Ok(target)
}
