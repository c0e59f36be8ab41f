use crate::base::neterror::NetError;
use time::{Duration, OffsetDateTime};
use url::Url;

/// A single stored cookie.
/// Modeled after Chromium's `net::CanonicalCookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCookie {
    pub name: String,
    pub value: String,
    /// Lowercase, without a leading dot.
    pub domain: String,
    pub path: String,
    pub creation_time: OffsetDateTime,
    /// `None` for session cookies.
    pub expiration_time: Option<OffsetDateTime>,
    pub secure: bool,
    pub http_only: bool,
    /// Set when the response carried no `Domain` attribute: the cookie is
    /// only sent back to the exact host that set it.
    pub host_only: bool,
}

impl CanonicalCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into().trim_start_matches('.').to_ascii_lowercase(),
            path: path.into(),
            creation_time: OffsetDateTime::now_utc(),
            expiration_time: None,
            secure: false,
            http_only: false,
            host_only: true,
        }
    }

    /// Parse one `Set-Cookie` header value received from `url`.
    ///
    /// Returns `None` for lines that do not parse, for a `Domain` attribute
    /// that is a public suffix or that `url`'s host does not belong to, and
    /// for cookies violating the `__Secure-`/`__Host-` prefix rules.
    pub fn from_set_cookie(line: &str, url: &Url) -> Option<Self> {
        let parsed = cookie::Cookie::parse(line).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        let now = OffsetDateTime::now_utc();

        if parsed.name().is_empty() {
            return None;
        }

        let (domain, host_only) = match parsed.domain() {
            Some(d) if !d.trim_start_matches('.').is_empty() => {
                let d = d.trim_start_matches('.').to_ascii_lowercase();
                if !crate::cookies::psl::is_valid_cookie_domain(&d, &host) {
                    return None;
                }
                (d, false)
            }
            _ => (host, true),
        };

        let path = match parsed.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => default_path(url),
        };

        // Max-Age wins over Expires (RFC 6265 5.3 step 3).
        let expiration_time = match parsed.max_age() {
            Some(age) if age <= Duration::ZERO => Some(OffsetDateTime::UNIX_EPOCH),
            Some(age) => Some(now.saturating_add(age)),
            None => parsed.expires().and_then(|e| e.datetime()),
        };

        let c = CanonicalCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            creation_time: now,
            expiration_time,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            host_only,
        };

        c.validate_prefix(url.scheme() == "https").ok()?;
        Some(c)
    }

    pub fn is_expired(&self, current_time: OffsetDateTime) -> bool {
        self.expiration_time
            .is_some_and(|expiry| expiry <= current_time)
    }

    /// RFC 6265 domain matching against a request host.
    pub fn domain_matches(&self, request_host: &str) -> bool {
        if self.host_only {
            return self.domain.eq_ignore_ascii_case(request_host);
        }

        if request_host.eq_ignore_ascii_case(&self.domain) {
            return true;
        }

        let host = request_host.to_ascii_lowercase();
        host.len() > self.domain.len()
            && host.ends_with(&self.domain)
            && host.as_bytes()[host.len() - self.domain.len() - 1] == b'.'
    }

    /// RFC 6265 path matching against a request path.
    pub fn path_matches(&self, request_path: &str) -> bool {
        if request_path == self.path || self.path == "/" {
            return true;
        }

        if let Some(rest) = request_path.strip_prefix(self.path.as_str()) {
            return self.path.ends_with('/') || rest.starts_with('/');
        }

        false
    }

    /// Validate __Secure- and __Host- cookie prefixes per RFC 6265bis.
    /// - __Secure- cookies MUST have the Secure attribute
    /// - __Host- cookies MUST have Secure, Path="/", and no Domain attribute
    pub fn validate_prefix(&self, secure_origin: bool) -> Result<(), NetError> {
        if self.name.starts_with("__Secure-") && (!self.secure || !secure_origin) {
            return Err(NetError::InvalidHeader);
        }

        if self.name.starts_with("__Host-")
            && (!self.secure || self.path != "/" || !self.host_only || !secure_origin)
        {
            return Err(NetError::InvalidHeader);
        }

        Ok(())
    }
}

/// RFC 6265 5.1.4 default-path: the directory of the request path.
fn default_path(url: &Url) -> String {
    let path = url.path();
    if !path.starts_with('/') {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}
