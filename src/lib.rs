//! # httpdns
//!
//! Transparent HTTPDNS interception for HTTP(S) clients.
//!
//! Hostnames are resolved out of band (an HTTP-based DNS service, a cache, a
//! static table) and requests are replayed against the resolved IP while the
//! `Host` header, TLS SNI, certificate validation and cookies keep using the
//! original hostname.
//!
//! ## Features
//!
//! - **Interception policy**: decide per URL and per redirect hop whether to
//!   intercept, which IP to connect to and which logical host to assert
//! - **HTTPDNS provider**: D+ style lookups with a TTL cache and optional
//!   non-blocking (cache-only) mode
//! - **Cookie store**: RFC 6265 jar keyed by hostname, never by IP, with
//!   PSL validation and an optional filter
//! - **Request tasks**: redirect chains, streaming or buffered bodies,
//!   timeouts and cancellation with exactly one terminal event
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use httpdns::dispatcher::{Dispatch, Dispatcher};
//! use httpdns::http::RequestDescriptor;
//! use httpdns::policy::HttpDnsPolicy;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpdns::base::neterror::NetError> {
//!     let dispatcher = Dispatcher::builder()
//!         .policy(HttpDnsPolicy::builder().async_lookup(true).build())
//!         .build()?;
//!
//!     let request = RequestDescriptor::get("https://example.com/")?;
//!     let (dispatch, mut events) = dispatcher.handle_with_events(request).await;
//!     if let Dispatch::Started(_task) = dispatch {
//!         while let Some(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error types and load states
//! - [`config`] - Serialisable configuration
//! - [`cookies`] - Cookie storage and persistence
//! - [`dispatcher`] - Entry point: interception decision and event relay
//! - [`dns`] - Resolution providers and cache
//! - [`http`] - Request/response descriptors, redirects, cache policy
//! - [`policy`] - Interception policy
//! - [`socket`] - Transport: TCP, BoringSSL and HTTP/1.1 exchange
//! - [`urlrequest`] - Request tasks

pub mod base;
pub mod config;
pub mod cookies;
pub mod dispatcher;
pub mod dns;
pub mod http;
pub mod policy;
pub mod socket;
pub mod urlrequest;

pub use base::neterror::{ErrorKind, NetError};
pub use config::Config;
pub use dispatcher::{ClientDelegate, Dispatch, Dispatcher, DispatcherBuilder, LoadEvent};
pub use http::{BodyMode, RequestDescriptor, ResponseDescriptor};
pub use policy::{HttpDnsPolicy, InterceptionPolicy};
