//! Redirect interpretation.
//!
//! Turns a 3xx response into the next request of the chain:
//! - 303 switches to GET (HEAD stays HEAD) and drops the body;
//! - 307 and 308 keep method and body;
//! - 300, 301 and 302 switch any method other than GET or HEAD to GET.
//!
//! Credentials do not follow a redirect to another origin.

use crate::base::neterror::NetError;
use crate::http::request::RequestDescriptor;
use crate::http::requestbody::RequestBody;
use crate::http::response::ResponseDescriptor;
use http::{header, HeaderName, Method, StatusCode};
use url::Url;

/// Headers describing the body, removed when the body is dropped.
const BODY_HEADERS: [HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_ENCODING,
    header::CONTENT_LANGUAGE,
    header::TRANSFER_ENCODING,
];

/// Headers that must not leak to a different origin.
const CREDENTIAL_HEADERS: [HeaderName; 3] = [
    header::AUTHORIZATION,
    header::PROXY_AUTHORIZATION,
    header::COOKIE,
];

pub fn is_redirect_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 300 | 301 | 302 | 303 | 307 | 308)
}

/// Absolute target of a redirect response.
///
/// `None` when the response is not a redirect (including a 3xx without
/// `Location`, which is a final response). An unparseable or non-HTTP
/// target is an error.
pub fn redirect_target(current: &Url, response: &ResponseDescriptor) -> Option<Result<Url, NetError>> {
    if !is_redirect_status(response.status) {
        return None;
    }
    let raw = response.headers.get(header::LOCATION)?;

    let target = raw
        .to_str()
        .ok()
        .and_then(|loc| current.join(loc).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or(NetError::InvalidRedirect);
    Some(target)
}

/// Build the follow-up request for a redirect to `new_url`.
pub fn follow_redirect(request: &RequestDescriptor, status: StatusCode, new_url: Url) -> RequestDescriptor {
    let mut next = request.clone();

    let switch_to_get = match status.as_u16() {
        307 | 308 => false,
        303 => next.method != Method::HEAD,
        _ => next.method != Method::GET && next.method != Method::HEAD,
    };

    if switch_to_get {
        next.method = Method::GET;
        next.body = RequestBody::Empty;
        for name in BODY_HEADERS.iter() {
            next.headers.remove(name);
        }
    }

    if request.url.origin() != new_url.origin() {
        tracing::debug!(
            from = %request.url,
            to = %new_url,
            "cross-origin redirect, dropping credentials"
        );
        for name in CREDENTIAL_HEADERS.iter() {
            next.headers.remove(name);
        }
    }

    next.headers.remove(header::HOST);
    next.url = new_url;
    next
}
