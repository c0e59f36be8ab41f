//! Response descriptor: the head of one exchange.

use http::{header, HeaderMap, StatusCode, Version};
use url::Url;

/// Status, headers and protocol version of one response, plus the URL that
/// produced it. Produced once per hop.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub version: Version,
    pub url: Url,
}

impl ResponseDescriptor {
    pub fn new(status: StatusCode, url: Url) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            url,
        }
    }

    pub fn from_parts(parts: &http::response::Parts, url: Url) -> Self {
        Self {
            status: parts.status,
            headers: parts.headers.clone(),
            version: parts.version,
            url,
        }
    }

    /// Protocol version string, e.g. `HTTP/1.1`.
    pub fn version_str(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2",
            Version::HTTP_3 => "HTTP/3",
            _ => "HTTP/1.1",
        }
    }

    /// `Location` header, if present and valid UTF-8.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION)?.to_str().ok()
    }

    /// Head of this response in the `http` crate's vocabulary.
    pub fn to_http(&self) -> http::Response<()> {
        let mut response = http::Response::new(());
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_and_version() {
        let mut resp = ResponseDescriptor::new(
            StatusCode::MOVED_PERMANENTLY,
            Url::parse("https://example.com/").unwrap(),
        );
        assert!(resp.location().is_none());
        resp.headers
            .insert(header::LOCATION, "/next".parse().unwrap());
        assert_eq!(resp.location(), Some("/next"));
        assert_eq!(resp.version_str(), "HTTP/1.1");

        let http = resp.to_http();
        assert_eq!(http.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(http.headers()[header::LOCATION], "/next");
    }
}
