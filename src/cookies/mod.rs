//! Cookie storage shared by all request tasks.
//!
//! | Type | Responsibility |
//! |------|----------------|
//! | [`CookieStore`] | Domain-bucketed jar, filtering, `Cookie` header rendering |
//! | [`CanonicalCookie`] | Single cookie parsed from `Set-Cookie` |
//! | [`psl`] | Public suffix checks for the `Domain` attribute |
//! | [`persistence`] | Optional load/save collaborator |
//!
//! Cookies are always keyed by the logical hostname of a request, never by
//! the IP address it was actually sent to.
//!
//! ```rust
//! use httpdns::cookies::CookieStore;
//! use url::Url;
//!
//! let jar = CookieStore::new();
//! let url = Url::parse("https://example.com/x").unwrap();
//! jar.parse_and_save_cookie(&url, "a=1; Domain=example.com; Path=/");
//! let next = Url::parse("https://example.com/y").unwrap();
//! assert_eq!(jar.cookie_header_for(&next), "a=1");
//! ```

pub mod canonical_cookie;
pub mod persistence;
pub mod psl;
pub mod store;

pub use canonical_cookie::CanonicalCookie;
pub use persistence::{CookiePersistence, JsonFilePersistence};
pub use store::{CookieFilter, CookieStore};
