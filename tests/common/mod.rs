//! Shared fixtures: an in-memory transport, a table-driven policy and a
//! delegate that records every event.

#![allow(dead_code)]

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use httpdns::base::neterror::{ErrorKind, NetError};
use httpdns::http::{CacheStoragePolicy, RequestBody, RequestDescriptor, ResponseBody, ResponseDescriptor};
use httpdns::policy::{InterceptionPolicy, Lookup};
use httpdns::socket::{ConnectTarget, Connecting, Connection, Exchanging, Transport};
use httpdns::urlrequest::{RedirectAction, TaskDelegate};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// One request as it reached the transport.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub target: ConnectTarget,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Exchange {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Handler = dyn Fn(&Exchange) -> Result<http::Response<ResponseBody>, NetError> + Send + Sync;

/// Transport answering from a closure and logging every exchange.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    pub log: Arc<Mutex<Vec<Exchange>>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Exchange) -> Result<http::Response<ResponseBody>, NetError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.log.lock().clone()
    }
}

impl Transport for MockTransport {
    fn open(&self, target: ConnectTarget) -> Connecting {
        let conn = MockConnection {
            target,
            handler: self.handler.clone(),
            log: self.log.clone(),
        };
        Box::pin(async move { Ok(Box::new(conn) as Box<dyn Connection>) })
    }
}

struct MockConnection {
    target: ConnectTarget,
    handler: Arc<Handler>,
    log: Arc<Mutex<Vec<Exchange>>>,
}

impl Connection for MockConnection {
    fn send(self: Box<Self>, request: http::Request<RequestBody>) -> Exchanging {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let exchange = Exchange {
                target: self.target,
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body: body.collect().await?,
            };
            self.log.lock().push(exchange.clone());
            (self.handler)(&exchange)
        })
    }
}

pub fn response(status: u16, headers: &[(&str, &str)], body: &'static str) -> http::Response<ResponseBody> {
    let mut builder = http::Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let chunks = if body.is_empty() {
        Vec::new()
    } else {
        vec![Bytes::from_static(body.as_bytes())]
    };
    builder.body(ResponseBody::from_chunks(chunks)).unwrap()
}

pub fn redirect(status: u16, location: &str) -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(status)
        .header("location", location)
        .body(ResponseBody::empty())
        .unwrap()
}

/// Sets its flag when dropped; attach one to a body to observe release.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Body yielding `first` and then never finishing. `released` flips once
/// the body is dropped.
pub fn stalled_body(first: &'static str, released: Arc<AtomicBool>) -> ResponseBody {
    use futures::StreamExt;
    let flag = DropFlag(released);
    let stream = futures::stream::once(async move { Ok::<_, NetError>(Bytes::from_static(first.as_bytes())) })
        .chain(futures::stream::pending())
        .map(move |chunk| {
            let _held = &flag;
            chunk
        });
    ResponseBody::new(stream)
}

/// Policy answering from a host table and logging every `resolved_ip` call.
#[derive(Default)]
pub struct TablePolicy {
    pub table: HashMap<String, IpAddr>,
    pub replacements: HashMap<String, String>,
    pub lookups: Mutex<Vec<String>>,
}

impl TablePolicy {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, IpAddr)>,
    {
        Self {
            table: entries.into_iter().map(|(h, ip)| (h.to_string(), ip)).collect(),
            ..Default::default()
        }
    }

    pub fn with_replacement(mut self, original: &str, replacement: &str) -> Self {
        self.replacements
            .insert(original.to_string(), replacement.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

impl InterceptionPolicy for TablePolicy {
    fn should_intercept(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    fn resolved_ip(&self, domain: &str) -> Lookup {
        self.lookups.lock().push(domain.to_string());
        let ip = self.table.get(domain).copied();
        Box::pin(std::future::ready(ip))
    }

    fn replacement_host(&self, original_host: &str) -> Option<String> {
        self.replacements.get(original_host).cloned()
    }
}

/// Forwards to an `Arc` so a test can keep a handle on the policy it gave
/// away.
pub struct SharedPolicy(pub Arc<TablePolicy>);

impl InterceptionPolicy for SharedPolicy {
    fn should_intercept(&self, url: &Url) -> bool {
        self.0.should_intercept(url)
    }

    fn resolved_ip(&self, domain: &str) -> Lookup {
        self.0.resolved_ip(domain)
    }

    fn replacement_host(&self, original_host: &str) -> Option<String> {
        self.0.replacement_host(original_host)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Redirect { to: Url, status: StatusCode },
    Response { status: StatusCode, cache: CacheStoragePolicy },
    Data(Bytes),
    Complete,
    Error(ErrorKind),
}

/// Delegate recording events into a shared log.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<Event>>>,
    pub stop_redirects: bool,
}

impl Recorder {
    pub fn stopping() -> Self {
        Self {
            stop_redirects: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Complete | Event::Error(_)))
            .count()
    }

    pub fn body(&self) -> Vec<u8> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Data(b) => Some(b.to_vec()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl TaskDelegate for Recorder {
    fn on_redirect(&mut self, request: &RequestDescriptor, response: &ResponseDescriptor) -> RedirectAction {
        self.events.lock().push(Event::Redirect {
            to: request.url.clone(),
            status: response.status,
        });
        if self.stop_redirects {
            RedirectAction::Stop
        } else {
            RedirectAction::Follow
        }
    }

    fn on_response(&mut self, response: &ResponseDescriptor, cache_policy: CacheStoragePolicy) {
        self.events.lock().push(Event::Response {
            status: response.status,
            cache: cache_policy,
        });
    }

    fn on_data(&mut self, chunk: Bytes) {
        self.events.lock().push(Event::Data(chunk));
    }

    fn on_complete(&mut self) {
        self.events.lock().push(Event::Complete);
    }

    fn on_error(&mut self, error: NetError) {
        self.events.lock().push(Event::Error(error.kind()));
    }
}
