//! Dispatcher tests: interception decision, canonicalisation and event relay.

mod common;

use bytes::Bytes;
use common::{redirect, response, MockTransport, SharedPolicy, TablePolicy};
use httpdns::base::neterror::{ErrorKind, NetError};
use httpdns::cookies::CookieStore;
use httpdns::dispatcher::{ClientDelegate, Dispatch, Dispatcher, LoadEvent};
use httpdns::http::{BodyMode, CacheStoragePolicy, RequestDescriptor};
use httpdns::policy::{HttpDnsPolicy, InterceptionPolicy, Lookup};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));

fn dispatcher(transport: &MockTransport, policy: impl InterceptionPolicy + 'static) -> Dispatcher {
    Dispatcher::builder()
        .policy(policy)
        .transport(transport.clone())
        .build()
        .unwrap()
}

async fn drain(mut events: UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        out.push(event);
        if terminal {
            break;
        }
    }
    out
}

#[test]
fn test_builder_requires_policy() {
    let err = Dispatcher::builder()
        .transport(MockTransport::new(|_| Ok(response(200, &[], ""))))
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn test_declined_requests_are_returned_untouched() {
    let transport = MockTransport::new(|_| Ok(response(200, &[], "")));
    let policy = HttpDnsPolicy::builder().bypass_host("skip.example.com").build();
    let dispatcher = dispatcher(&transport, policy);

    let request = RequestDescriptor::get("https://skip.example.com/#frag").unwrap();
    assert!(!dispatcher.can_handle(&request));

    let (dispatch, _events) = dispatcher.handle_with_events(request).await;
    match dispatch {
        Dispatch::Declined(request) => {
            assert_eq!(request.url.fragment(), Some("frag"));
            assert!(request.headers.is_empty());
        }
        other => panic!("expected Declined, got {:?}", other),
    }
    assert!(transport.exchanges().is_empty());
}

#[tokio::test]
async fn test_event_channel_order() {
    let transport = MockTransport::new(|ex| match ex.uri.path() {
        "/start" => Ok(redirect(302, "/end")),
        _ => Ok(response(200, &[], "hello")),
    });
    let dispatcher = dispatcher(&transport, TablePolicy::new([("api.example.com", IP)]));

    let request = RequestDescriptor::get("https://api.example.com/start#top").unwrap();
    let (dispatch, events) = dispatcher.handle_with_events(request).await;
    assert!(matches!(dispatch, Dispatch::Started(_)));

    let events = drain(events).await;
    assert_eq!(events.len(), 4);
    match &events[0] {
        LoadEvent::Redirected { request, response } => {
            assert_eq!(request.url.path(), "/end");
            assert_eq!(response.status, 302);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        &events[1],
        LoadEvent::Response { response, cache_policy: CacheStoragePolicy::AllowedInMemoryOnly }
            if response.status == 200
    ));
    assert!(matches!(&events[2], LoadEvent::Data(b) if b == &Bytes::from_static(b"hello")));
    assert!(matches!(events[3], LoadEvent::Complete));

    // Canonicalised before the first hop.
    let first = &transport.exchanges()[0];
    assert_eq!(first.uri.to_string(), "https://api.example.com/start");
    assert_eq!(first.header("accept"), Some("*/*"));
    assert_eq!(first.target.addr, Some(IP));
}

#[tokio::test]
async fn test_default_body_mode_from_builder() {
    let transport = MockTransport::new(|_| {
        Ok(http::Response::builder()
            .status(200)
            .body(httpdns::http::ResponseBody::from_chunks(vec![
                Bytes::from_static(b"x"),
                Bytes::from_static(b"y"),
            ]))
            .unwrap())
    });
    let dispatcher = Dispatcher::builder()
        .policy(TablePolicy::default())
        .transport(transport.clone())
        .body_mode(BodyMode::Buffered)
        .build()
        .unwrap();

    let (_, events) = dispatcher
        .handle_with_events(RequestDescriptor::get("http://a.test/").unwrap())
        .await;
    let data: Vec<_> = drain(events)
        .await
        .into_iter()
        .filter_map(|e| match e {
            LoadEvent::Data(b) => Some(b),
            _ => None,
        })
        .collect();
    assert_eq!(data, vec![Bytes::from_static(b"xy")]);
}

#[tokio::test]
async fn test_builder_limits_apply() {
    let transport = MockTransport::new(|_| Ok(redirect(301, "/again")));
    let dispatcher = Dispatcher::builder()
        .policy(TablePolicy::default())
        .transport(transport.clone())
        .max_redirects(1)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let (_, events) = dispatcher
        .handle_with_events(RequestDescriptor::get("http://a.test/").unwrap())
        .await;
    let events = drain(events).await;
    assert!(matches!(
        events.last(),
        Some(LoadEvent::Failed(NetError::TooManyRedirects))
    ));
    assert_eq!(transport.exchanges().len(), 2);
}

#[tokio::test]
async fn test_shared_cookie_store() {
    let store = Arc::new(CookieStore::new());
    let transport = MockTransport::new(|_| Ok(response(200, &[("set-cookie", "k=v")], "")));
    let dispatcher = Dispatcher::builder()
        .policy(TablePolicy::default())
        .transport(transport)
        .cookie_store(store.clone())
        .build()
        .unwrap();

    let (_, events) = dispatcher
        .handle_with_events(RequestDescriptor::get("https://a.test/").unwrap())
        .await;
    drain(events).await;

    assert!(Arc::ptr_eq(dispatcher.cookie_store(), &store));
    assert_eq!(store.cookie_header_for(&Url::parse("https://a.test/").unwrap()), "k=v");
}

#[derive(Debug, PartialEq)]
enum Seen {
    Redirect(String),
    Response(u16),
    Data(Bytes),
    Finished,
    Failed(ErrorKind),
}

#[derive(Clone, Default)]
struct HttpDelegate {
    seen: Arc<Mutex<Vec<Seen>>>,
    follow: bool,
}

impl ClientDelegate for HttpDelegate {
    fn was_redirected(&mut self, request: &http::Request<()>, _response: &http::Response<()>) -> bool {
        self.seen.lock().push(Seen::Redirect(request.uri().to_string()));
        self.follow
    }

    fn did_receive_response(&mut self, response: http::Response<()>, _cache_policy: CacheStoragePolicy) {
        self.seen.lock().push(Seen::Response(response.status().as_u16()));
    }

    fn did_load_data(&mut self, data: Bytes) {
        self.seen.lock().push(Seen::Data(data));
    }

    fn did_finish_loading(&mut self) {
        self.seen.lock().push(Seen::Finished);
    }

    fn did_fail(&mut self, error: NetError) {
        self.seen.lock().push(Seen::Failed(error.kind()));
    }
}

#[tokio::test]
async fn test_client_delegate_can_stop_redirect() {
    let transport = MockTransport::new(|_| Ok(redirect(301, "https://b.test/next")));
    let dispatcher = dispatcher(&transport, TablePolicy::default());

    let delegate = HttpDelegate::default();
    let dispatch = dispatcher
        .handle(RequestDescriptor::get("https://a.test/").unwrap(), delegate.clone())
        .await;
    let Dispatch::Started(handle) = dispatch else {
        panic!("expected Started");
    };
    handle.wait().await.unwrap();

    assert_eq!(
        *delegate.seen.lock(),
        vec![
            Seen::Redirect("https://b.test/next".into()),
            Seen::Response(301),
            Seen::Finished,
        ]
    );
    assert_eq!(transport.exchanges().len(), 1);
}

#[tokio::test]
async fn test_client_delegate_follows_redirect() {
    let transport = MockTransport::new(|ex| match ex.uri.host() {
        Some("a.test") => Ok(redirect(301, "https://b.test/next")),
        _ => Ok(response(200, &[], "body")),
    });
    let policy = Arc::new(TablePolicy::default());
    let dispatcher = dispatcher(&transport, SharedPolicy(policy.clone()));

    let delegate = HttpDelegate {
        follow: true,
        ..Default::default()
    };
    let Dispatch::Started(handle) = dispatcher
        .handle(RequestDescriptor::get("https://a.test/").unwrap(), delegate.clone())
        .await
    else {
        panic!("expected Started");
    };
    handle.wait().await.unwrap();

    assert_eq!(
        *delegate.seen.lock(),
        vec![
            Seen::Redirect("https://b.test/next".into()),
            Seen::Response(200),
            Seen::Data(Bytes::from_static(b"body")),
            Seen::Finished,
        ]
    );
    assert_eq!(policy.lookups(), vec!["a.test", "b.test"]);
}

/// Intercepts everything but cannot describe the URL's host.
struct HostlessPolicy;

impl InterceptionPolicy for HostlessPolicy {
    fn should_intercept(&self, _url: &Url) -> bool {
        true
    }

    fn resolved_ip(&self, _domain: &str) -> Lookup {
        Box::pin(std::future::ready(None))
    }
}

#[tokio::test]
async fn test_start_failure_reported_to_delegate() {
    let transport = MockTransport::new(|_| Ok(response(200, &[], "")));
    let dispatcher = dispatcher(&transport, HostlessPolicy);

    let delegate = HttpDelegate::default();
    let request = RequestDescriptor::new(http::Method::GET, Url::parse("data:text/plain,hi").unwrap());
    let dispatch = dispatcher.handle(request, delegate.clone()).await;

    assert!(matches!(dispatch, Dispatch::Failed(NetError::InvalidUrl)));
    assert_eq!(*delegate.seen.lock(), vec![Seen::Failed(ErrorKind::InvalidRequest)]);
    assert!(transport.exchanges().is_empty());
}

#[tokio::test]
async fn test_dropped_receiver_does_not_cancel() {
    let transport = MockTransport::new(|_| Ok(response(200, &[("set-cookie", "late=1")], "ignored")));
    let dispatcher = dispatcher(&transport, TablePolicy::default());

    let (dispatch, events) = dispatcher
        .handle_with_events(RequestDescriptor::get("https://a.test/").unwrap())
        .await;
    drop(events);
    let Dispatch::Started(handle) = dispatch else {
        panic!("expected Started");
    };
    handle.wait().await.unwrap();

    assert_eq!(
        dispatcher
            .cookie_store()
            .cookie_header_for(&Url::parse("https://a.test/").unwrap()),
        "late=1"
    );
}
