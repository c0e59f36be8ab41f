//! File-based configuration.
//!
//! Everything here can also be set through the builders; this is the
//! serialisable form, read from JSON.
//!
//! ```json
//! {
//!   "dispatcher": {
//!     "max_redirects": 10,
//!     "timeout_secs": 30,
//!     "body_mode": "buffered",
//!     "fallback_resolver": "hickory"
//!   },
//!   "httpdns": {
//!     "server": "119.29.29.29:80",
//!     "async_lookup": true,
//!     "bypass_hosts": ["localhost"],
//!     "host_replacements": { "cdn.example.com": "www.example.com" }
//!   }
//! }
//! ```

use crate::base::neterror::NetError;
use crate::dispatcher::DispatcherBuilder;
use crate::dns::{GaiResolver, HickoryResolver, HttpDnsResolver, DEFAULT_CACHE_TTL, DEFAULT_SERVER};
use crate::http::BodyMode;
use crate::policy::HttpDnsPolicy;
use crate::socket::{HttpTransport, TlsConfig};
use crate::urlrequest::{RequestContextConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatcher: DispatcherConfig,
    pub httpdns: HttpDnsConfig,
}

/// Resolver used for hops the policy did not substitute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackResolver {
    /// getaddrinfo on the blocking pool.
    #[default]
    System,
    /// hickory-dns with the system configuration.
    Hickory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub max_redirects: usize,
    pub timeout_secs: u64,
    pub body_mode: BodyMode,
    pub fallback_resolver: FallbackResolver,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            body_mode: BodyMode::Streaming,
            fallback_resolver: FallbackResolver::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpDnsConfig {
    /// D+ endpoint. Must be an IP literal so its own lookups never need DNS.
    pub server: SocketAddr,
    pub lookup_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub async_lookup: bool,
    pub bypass_hosts: Vec<String>,
    pub host_replacements: BTreeMap<String, String>,
}

impl Default for HttpDnsConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER,
            lookup_timeout_secs: 5,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            async_lookup: false,
            bypass_hosts: Vec::new(),
            host_replacements: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::config(format!("invalid config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| NetError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn context_config(&self) -> RequestContextConfig {
        RequestContextConfig {
            max_redirects: self.dispatcher.max_redirects,
            default_timeout: Duration::from_secs(self.dispatcher.timeout_secs),
            default_body_mode: self.dispatcher.body_mode,
        }
    }

    /// HTTPDNS policy backed by the configured D+ server.
    pub fn httpdns_policy(&self) -> HttpDnsPolicy {
        let dns = &self.httpdns;
        let lookup_timeout = Duration::from_secs(dns.lookup_timeout_secs);
        let mut builder = HttpDnsPolicy::builder()
            .resolver(HttpDnsResolver::new(dns.server).with_timeout(lookup_timeout))
            .lookup_timeout(lookup_timeout)
            .cache_ttl(Duration::from_secs(dns.cache_ttl_secs))
            .async_lookup(dns.async_lookup)
            .bypass_host(dns.server.ip().to_string())
            .bypass_hosts(dns.bypass_hosts.iter().cloned());
        for (original, replacement) in &dns.host_replacements {
            builder = builder.host_replacement(original.clone(), replacement.clone());
        }
        builder.build()
    }

    /// Default transport over the configured fallback resolver.
    pub fn transport(&self) -> Result<HttpTransport, NetError> {
        match self.dispatcher.fallback_resolver {
            FallbackResolver::System => HttpTransport::with_config(TlsConfig::default(), GaiResolver::new()),
            FallbackResolver::Hickory => {
                HttpTransport::with_config(TlsConfig::default(), HickoryResolver::new())
            }
        }
    }

    /// Dispatcher builder preloaded with this configuration's policy,
    /// transport and limits.
    pub fn dispatcher_builder(&self) -> Result<DispatcherBuilder, NetError> {
        let limits = self.context_config();
        Ok(crate::dispatcher::Dispatcher::builder()
            .policy(self.httpdns_policy())
            .transport(self.transport()?)
            .max_redirects(limits.max_redirects)
            .timeout(limits.default_timeout)
            .body_mode(limits.default_body_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::InterceptionPolicy;
    use url::Url;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.dispatcher.max_redirects, 20);
        assert_eq!(config.dispatcher.timeout_secs, 60);
        assert_eq!(config.httpdns.server, DEFAULT_SERVER);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_json_str(
            r#"{
                "dispatcher": { "max_redirects": 3, "body_mode": "buffered" },
                "httpdns": {
                    "async_lookup": true,
                    "bypass_hosts": ["Internal.Example.com"],
                    "host_replacements": { "cdn.example.com": "www.example.com" }
                }
            }"#,
        )
        .unwrap();

        let limits = config.context_config();
        assert_eq!(limits.max_redirects, 3);
        assert_eq!(limits.default_timeout, DEFAULT_TIMEOUT);
        assert_eq!(limits.default_body_mode, BodyMode::Buffered);

        let policy = config.httpdns_policy();
        assert!(policy.is_async());
        assert!(!policy.should_intercept(&Url::parse("https://internal.example.com/").unwrap()));
        assert!(policy.should_intercept(&Url::parse("https://api.example.com/").unwrap()));
        assert_eq!(
            policy.replacement_host("cdn.example.com").as_deref(),
            Some("www.example.com")
        );
    }

    #[tokio::test]
    async fn test_fallback_resolver_selection() {
        let config = Config::from_json_str(r#"{ "dispatcher": { "fallback_resolver": "hickory" } }"#).unwrap();
        assert_eq!(config.dispatcher.fallback_resolver, FallbackResolver::Hickory);
        assert!(config.transport().is_ok());
        assert!(config.dispatcher_builder().unwrap().build().is_ok());

        assert_eq!(Config::default().dispatcher.fallback_resolver, FallbackResolver::System);
        assert!(Config::from_json_str(r#"{ "dispatcher": { "fallback_resolver": "bogus" } }"#).is_err());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = Config::from_json_str("{ \"dispatcher\": 5 }").unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("httpdns.json");
        std::fs::write(&path, r#"{ "httpdns": { "server": "127.0.0.1:8053" } }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.httpdns.server, "127.0.0.1:8053".parse().unwrap());
        assert!(Config::from_file(dir.path().join("missing.json")).is_err());
    }
}
