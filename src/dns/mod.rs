//! Hostname resolution.
//!
//! Two roles share the [`Resolve`] trait:
//! - the *resolution provider* consulted by interception policies
//!   ([`HttpDnsResolver`], usually behind a [`CachedResolver`]);
//! - the *normal resolution* path the transport falls back to when a
//!   connection got no IP substitution ([`GaiResolver`], [`HickoryResolver`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use httpdns::dns::{CachedResolver, HttpDnsResolver, Name, Resolve};
//!
//! let resolver = CachedResolver::new(HttpDnsResolver::default());
//! let addrs = resolver.resolve(Name::new("example.com")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr.ip());
//! }
//! ```

mod cache;
mod gai;
mod hickory;
mod httpdns;
mod resolve;

pub use cache::{CachedResolver, DEFAULT_CACHE_TTL};
pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use httpdns::{parse_dplus, HttpDnsResolver, DEFAULT_SERVER};
pub use resolve::{ip_literal, Addrs, Answer, Answering, Name, Resolve, Resolving, StaticResolver};
