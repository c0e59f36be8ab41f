//! Protocol dispatcher with builder pattern.
//!
//! The entry point callers talk to. It decides whether a request goes
//! through the engine, resolves the first hop and starts a task, then
//! relays task events in the `http` crate's request/response vocabulary.
//!
//! # Example
//!
//! ```rust,ignore
//! use httpdns::dispatcher::{Dispatch, Dispatcher};
//! use httpdns::http::RequestDescriptor;
//! use httpdns::policy::HttpDnsPolicy;
//!
//! let dispatcher = Dispatcher::builder()
//!     .policy(HttpDnsPolicy::builder().build())
//!     .build()?;
//!
//! let request = RequestDescriptor::get("https://example.com/")?;
//! let (dispatch, mut events) = dispatcher.handle_with_events(request).await;
//! match dispatch {
//!     Dispatch::Started(_handle) => {
//!         while let Some(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     }
//!     Dispatch::Declined(request) => { /* send it the usual way */ }
//!     Dispatch::Failed(e) => eprintln!("{}", e),
//! }
//! ```

use crate::base::neterror::NetError;
use crate::cookies::CookieStore;
use crate::http::{canonicalize, BodyMode, CacheStoragePolicy, RequestDescriptor, ResponseDescriptor};
use crate::policy::{resolve_target, InterceptionPolicy};
use crate::socket::{HttpTransport, Transport};
use crate::urlrequest::{
    RedirectAction, RequestContext, RequestContextConfig, RequestTask, TaskDelegate, TaskHandle,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Caller-facing events, in the `http` crate's vocabulary.
pub trait ClientDelegate: Send + 'static {
    /// A redirect was received. Return `false` to stop and receive the
    /// redirect response itself as the final response.
    fn was_redirected(&mut self, _request: &http::Request<()>, _response: &http::Response<()>) -> bool {
        true
    }

    fn did_receive_response(&mut self, response: http::Response<()>, cache_policy: CacheStoragePolicy);

    fn did_load_data(&mut self, data: Bytes);

    fn did_finish_loading(&mut self);

    fn did_fail(&mut self, error: NetError);
}

/// Adapts a [`ClientDelegate`] to task events.
struct Relay<D>(D);

impl<D: ClientDelegate> TaskDelegate for Relay<D> {
    fn on_redirect(&mut self, request: &RequestDescriptor, response: &ResponseDescriptor) -> RedirectAction {
        let follow = match request.to_http() {
            Ok(next) => self.0.was_redirected(&next, &response.to_http()),
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "redirect not expressible as http::Request");
                true
            }
        };
        if follow {
            RedirectAction::Follow
        } else {
            RedirectAction::Stop
        }
    }

    fn on_response(&mut self, response: &ResponseDescriptor, cache_policy: CacheStoragePolicy) {
        self.0.did_receive_response(response.to_http(), cache_policy);
    }

    fn on_data(&mut self, chunk: Bytes) {
        self.0.did_load_data(chunk);
    }

    fn on_complete(&mut self) {
        self.0.did_finish_loading();
    }

    fn on_error(&mut self, error: NetError) {
        self.0.did_fail(error);
    }
}

/// One task event, as delivered through [`Dispatcher::handle_with_events`].
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Redirected {
        request: RequestDescriptor,
        response: ResponseDescriptor,
    },
    Response {
        response: ResponseDescriptor,
        cache_policy: CacheStoragePolicy,
    },
    Data(Bytes),
    Complete,
    Failed(NetError),
}

impl LoadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadEvent::Complete | LoadEvent::Failed(_))
    }
}

/// Task delegate that forwards every event into a channel. Redirects are
/// always followed.
struct ChannelDelegate {
    tx: mpsc::UnboundedSender<LoadEvent>,
}

impl ChannelDelegate {
    fn send(&self, event: LoadEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

impl TaskDelegate for ChannelDelegate {
    fn on_redirect(&mut self, request: &RequestDescriptor, response: &ResponseDescriptor) -> RedirectAction {
        self.send(LoadEvent::Redirected {
            request: request.clone(),
            response: response.clone(),
        });
        RedirectAction::Follow
    }

    fn on_response(&mut self, response: &ResponseDescriptor, cache_policy: CacheStoragePolicy) {
        self.send(LoadEvent::Response {
            response: response.clone(),
            cache_policy,
        });
    }

    fn on_data(&mut self, chunk: Bytes) {
        self.send(LoadEvent::Data(chunk));
    }

    fn on_complete(&mut self) {
        self.send(LoadEvent::Complete);
    }

    fn on_error(&mut self, error: NetError) {
        self.send(LoadEvent::Failed(error));
    }
}

/// Outcome of [`Dispatcher::handle`].
#[derive(Debug)]
pub enum Dispatch {
    /// A task now owns the request.
    Started(TaskHandle),
    /// The policy does not intercept this request; it is handed back
    /// untouched for the caller's normal stack.
    Declined(RequestDescriptor),
    /// The request could not be started; the delegate already got
    /// `did_fail`.
    Failed(NetError),
}

/// Intercepts requests and runs them as [`RequestTask`]s.
///
/// Use [`Dispatcher::builder()`] to configure and create a dispatcher.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    ctx: RequestContext,
}

impl Dispatcher {
    /// Create a new dispatcher builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn cookie_store(&self) -> &Arc<CookieStore> {
        &self.ctx.cookie_store
    }

    pub fn policy(&self) -> &Arc<dyn InterceptionPolicy> {
        &self.ctx.policy
    }

    pub fn config(&self) -> &RequestContextConfig {
        &self.ctx.config
    }

    /// Whether `request` goes through the engine.
    pub fn can_handle(&self, request: &RequestDescriptor) -> bool {
        self.ctx.policy.should_intercept(&request.url)
    }

    /// Start a task for `request`, relaying its events to `delegate`.
    ///
    /// Each call starts at most one task, and the returned handle is the
    /// only way to cancel it.
    pub async fn handle<D: ClientDelegate>(&self, request: RequestDescriptor, delegate: D) -> Dispatch {
        self.dispatch(request, Box::new(Relay(delegate))).await
    }

    /// Like [`handle`](Self::handle), but events arrive on a channel.
    /// Redirects are always followed. Dropping the receiver does not cancel
    /// the task; its remaining events are discarded.
    pub async fn handle_with_events(
        &self,
        request: RequestDescriptor,
    ) -> (Dispatch, mpsc::UnboundedReceiver<LoadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatch = self.dispatch(request, Box::new(ChannelDelegate { tx })).await;
        (dispatch, rx)
    }

    async fn dispatch(&self, request: RequestDescriptor, mut delegate: Box<dyn TaskDelegate>) -> Dispatch {
        if !self.can_handle(&request) {
            tracing::debug!(url = %request.url, "request not intercepted");
            return Dispatch::Declined(request);
        }

        let request = canonicalize(request);
        match resolve_target(self.ctx.policy.as_ref(), &request.url).await {
            Ok(target) => {
                let handle = RequestTask::new(self.ctx.clone()).start_boxed(request, target, delegate);
                Dispatch::Started(handle)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "request could not be started");
                delegate.on_error(e.clone());
                Dispatch::Failed(e)
            }
        }
    }
}

/// Builder for creating a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    policy: Option<Arc<dyn InterceptionPolicy>>,
    cookie_store: Option<Arc<CookieStore>>,
    transport: Option<Arc<dyn Transport>>,
    config: RequestContextConfig,
}

impl DispatcherBuilder {
    /// Set the interception policy. Required.
    pub fn policy<P: InterceptionPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn shared_policy(mut self, policy: Arc<dyn InterceptionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Share a cookie store. Defaults to a fresh, empty store.
    pub fn cookie_store(mut self, store: Arc<CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Set the transport. Defaults to [`HttpTransport`].
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Default per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn body_mode(mut self, mode: BodyMode) -> Self {
        self.config.default_body_mode = mode;
        self
    }

    pub fn build(self) -> Result<Dispatcher, NetError> {
        let policy = self
            .policy
            .ok_or_else(|| NetError::config("dispatcher needs an interception policy"))?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let cookie_store = self.cookie_store.unwrap_or_default();

        Ok(Dispatcher {
            ctx: RequestContext::new(transport, policy, cookie_store).with_config(self.config),
        })
    }
}
