//! Request descriptor.

use crate::base::neterror::NetError;
use crate::http::requestbody::RequestBody;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// How the response body reaches the delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    /// Chunks delivered as they arrive.
    #[default]
    Streaming,
    /// The whole body delivered in one chunk just before completion.
    Buffered,
}

/// One request as issued by the caller.
///
/// Headers keep every value of a repeated name in insertion order.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Whole-task deadline; `None` uses the dispatcher default.
    pub timeout: Option<Duration>,
    /// `None` uses the dispatcher default.
    pub body_mode: Option<BodyMode>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            timeout: None,
            body_mode: None,
        }
    }

    /// GET request for `url`.
    pub fn get(url: &str) -> Result<Self, NetError> {
        Ok(Self::new(Method::GET, Url::parse(url).map_err(|_| NetError::InvalidUrl)?))
    }

    /// POST request for `url` carrying `body`.
    pub fn post(url: &str, body: impl Into<RequestBody>) -> Result<Self, NetError> {
        Ok(Self::new(Method::POST, Url::parse(url).map_err(|_| NetError::InvalidUrl)?).with_body(body))
    }

    /// Append a header value, keeping earlier values of the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, NetError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| NetError::InvalidHeader)?;
        let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_body_mode(mut self, mode: BodyMode) -> Self {
        self.body_mode = Some(mode);
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Build from the `http` crate's request type.
    pub fn from_http<B: Into<RequestBody>>(request: http::Request<B>) -> Result<Self, NetError> {
        let (parts, body) = request.into_parts();
        let url = Url::parse(&parts.uri.to_string()).map_err(|_| NetError::InvalidUrl)?;
        Ok(Self {
            method: parts.method,
            url,
            headers: parts.headers,
            body: body.into(),
            timeout: None,
            body_mode: None,
        })
    }

    /// Head of this request in the `http` crate's vocabulary.
    pub fn to_http(&self) -> Result<http::Request<()>, NetError> {
        let mut request = http::Request::builder()
            .method(self.method.clone())
            .uri(self.url.as_str())
            .body(())
            .map_err(|_| NetError::InvalidUrl)?;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_value_headers_preserved() {
        let req = RequestDescriptor::get("https://example.com/")
            .unwrap()
            .with_header("X-Trace", "a")
            .unwrap()
            .with_header("x-trace", "b")
            .unwrap();
        let values: Vec<_> = req.headers.get_all("X-TRACE").iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = RequestDescriptor::get("https://example.com/")
            .unwrap()
            .with_header("bad header", "x")
            .unwrap_err();
        assert!(matches!(err, NetError::InvalidHeader));
    }

    #[test]
    fn test_http_conversion() {
        let request = http::Request::post("https://example.com/upload?x=1")
            .header("content-type", "text/plain")
            .body("payload")
            .unwrap();
        let desc = RequestDescriptor::from_http(request).unwrap();
        assert_eq!(desc.method, Method::POST);
        assert_eq!(desc.url.path(), "/upload");
        assert_eq!(desc.body.len(), Some(7));

        let back = desc.to_http().unwrap();
        assert_eq!(back.uri(), "https://example.com/upload?x=1");
        assert_eq!(back.headers()["content-type"], "text/plain");
    }
}
