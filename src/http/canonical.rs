//! Canonical form of an incoming request.

use crate::http::request::RequestDescriptor;
use http::header::{self, HeaderValue};

/// Normalize a request before the first hop: drop the URL fragment, drop a
/// trailing dot on the host and default `Accept` to `*/*`.
pub fn canonicalize(mut request: RequestDescriptor) -> RequestDescriptor {
    request.url.set_fragment(None);

    let trimmed = request
        .url
        .host_str()
        .filter(|h| h.len() > 1 && h.ends_with('.'))
        .map(|h| h.trim_end_matches('.').to_string());
    if let Some(host) = trimmed {
        if request.url.set_host(Some(&host)).is_err() {
            tracing::debug!(host = %host, "could not normalize host, keeping original");
        }
    }

    if !request.headers.contains_key(header::ACCEPT) {
        request
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_and_trailing_dot() {
        let req = RequestDescriptor::get("https://Example.COM./a/b?x=1#frag").unwrap();
        let req = canonicalize(req);
        assert_eq!(req.url.as_str(), "https://example.com/a/b?x=1");
        assert_eq!(req.headers[header::ACCEPT], "*/*");
    }

    #[test]
    fn test_caller_accept_kept() {
        let req = RequestDescriptor::get("https://example.com/")
            .unwrap()
            .with_header("accept", "application/json")
            .unwrap();
        assert_eq!(canonicalize(req).headers[header::ACCEPT], "application/json");
    }
}
