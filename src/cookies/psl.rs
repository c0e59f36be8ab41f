//! Public Suffix List (PSL) checks for the `Domain` cookie attribute.
//!
//! Rejects cookies scoped to public suffixes like `.com` or `.co.uk` and
//! cookies scoped to a domain the setting host does not belong to.
//! Uses Mozilla's Public Suffix List via the `psl` crate.

use psl::{List, Psl};
use std::net::IpAddr;

/// Returns true if `domain` is itself a public suffix (e.g., "com", "co.uk").
pub fn is_public_suffix(domain: &str) -> bool {
    let domain_lower = domain.to_ascii_lowercase();
    let domain_bytes = domain_lower.as_bytes();

    match List.suffix(domain_bytes) {
        Some(suffix) => suffix.is_known() && suffix.as_bytes() == domain_bytes,
        None => false,
    }
}

/// Whether a `Domain=cookie_domain` attribute is acceptable on a response
/// from `request_host`.
pub fn is_valid_cookie_domain(cookie_domain: &str, request_host: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let request_host = request_host.to_ascii_lowercase();

    // An IP host can only set a cookie for itself.
    if request_host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
    {
        return cookie_domain == request_host;
    }

    // A public suffix is only acceptable when it is the host itself
    // (treated as host-only by browsers; we accept the exact match).
    if is_public_suffix(&cookie_domain) {
        return cookie_domain == request_host;
    }

    request_host == cookie_domain || request_host.ends_with(&format!(".{}", cookie_domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_public_suffix() {
        assert!(is_public_suffix("com"));
        assert!(is_public_suffix("CO.UK"));
        assert!(is_public_suffix("github.io"));
        assert!(!is_public_suffix("example.com"));
        assert!(!is_public_suffix("sub.example.com"));
    }

    #[test]
    fn test_valid_cookie_domain() {
        assert!(is_valid_cookie_domain("example.com", "example.com"));
        assert!(is_valid_cookie_domain("example.com", "sub.example.com"));
        assert!(is_valid_cookie_domain(".example.com", "sub.example.com"));
    }

    #[test]
    fn test_invalid_cookie_domain() {
        assert!(!is_valid_cookie_domain("com", "example.com"));
        assert!(!is_valid_cookie_domain(".co.uk", "example.co.uk"));
        assert!(!is_valid_cookie_domain("other.com", "example.com"));
        assert!(!is_valid_cookie_domain("ample.com", "example.com"));
    }

    #[test]
    fn test_ip_host() {
        assert!(is_valid_cookie_domain("127.0.0.1", "127.0.0.1"));
        assert!(!is_valid_cookie_domain("0.0.1", "127.0.0.1"));
    }
}
