//! Cache storage policy for a completed exchange.

use crate::http::request::RequestDescriptor;
use crate::http::response::ResponseDescriptor;
use http::{header, HeaderMap};

/// Whether a response may be stored by the caller's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStoragePolicy {
    Allowed,
    AllowedInMemoryOnly,
    NotAllowed,
}

fn cache_control(headers: &HeaderMap) -> String {
    headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
        .to_ascii_lowercase()
}

/// Storage policy derived from the status code and both `Cache-Control`
/// headers. HTTPS responses are kept in memory only.
pub fn storage_policy(request: &RequestDescriptor, response: &ResponseDescriptor) -> CacheStoragePolicy {
    let cacheable_status = matches!(
        response.status.as_u16(),
        200 | 203 | 206 | 301 | 304 | 404 | 410
    );
    if !cacheable_status {
        return CacheStoragePolicy::NotAllowed;
    }

    if cache_control(&response.headers).contains("no-store") {
        return CacheStoragePolicy::NotAllowed;
    }

    let request_cc = cache_control(&request.headers);
    if request_cc.contains("no-store") && request_cc.contains("no-cache") {
        return CacheStoragePolicy::NotAllowed;
    }

    if request.url.scheme() == "https" {
        CacheStoragePolicy::AllowedInMemoryOnly
    } else {
        CacheStoragePolicy::Allowed
    }
}
