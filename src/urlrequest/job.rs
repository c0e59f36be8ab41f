//! Request task: one request and its redirect chain.
//!
//! Each hop builds the wire request for the resolved target, asks the
//! transport for a connection, captures cookies from the response head and
//! either follows a redirect (re-consulting the policy for the new URL) or
//! delivers the response to the delegate.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::redirect::{follow_redirect, redirect_target};
use crate::http::{storage_policy, BodyMode, RequestDescriptor, ResponseBody, ResponseDescriptor};
use crate::policy::{resolve_target, ResolvedTarget};
use crate::socket::{ConnectTarget, Connecting, Connection, Exchanging};
use crate::urlrequest::context::RequestContext;
use crate::urlrequest::delegate::{RedirectAction, TaskDelegate};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::header::{self, HeaderMap, HeaderValue};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::{poll_fn, Future};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;
use tokio::task::JoinHandle;
use url::Url;

/// Network resources of the current hop. Kept in [`Shared`] instead of on
/// the task's stack so that `cancel` can drop them before it returns.
enum InFlight {
    Connecting(Connecting),
    Exchanging(Exchanging),
    Body { body: ResponseBody, buffer: BytesMut },
}

/// State shared between a running task and its handle.
struct Shared {
    cancelled: AtomicBool,
    state: Mutex<LoadState>,
    delegate: Mutex<Option<Box<dyn TaskDelegate>>>,
    inflight: Mutex<Option<InFlight>>,
}

impl Shared {
    /// Park `inflight` for the current hop. Dropped on the spot when the
    /// task is already cancelled.
    fn hold(&self, inflight: InFlight) {
        let mut slot = self.inflight.lock();
        if !self.cancelled.load(Ordering::Acquire) {
            *slot = Some(inflight);
        }
    }

    fn release(&self) {
        let released = self.inflight.lock().take();
        drop(released);
    }

    async fn connect(&self, connecting: Connecting) -> Result<Box<dyn Connection>, NetError> {
        self.hold(InFlight::Connecting(connecting));
        let result = poll_fn(|cx| match self.inflight.lock().as_mut() {
            Some(InFlight::Connecting(fut)) => fut.as_mut().poll(cx),
            _ => Poll::Ready(Err(NetError::Aborted)),
        })
        .await;
        self.release();
        result
    }

    async fn exchange(&self, exchanging: Exchanging) -> Result<http::Response<ResponseBody>, NetError> {
        self.hold(InFlight::Exchanging(exchanging));
        let result = poll_fn(|cx| match self.inflight.lock().as_mut() {
            Some(InFlight::Exchanging(fut)) => fut.as_mut().poll(cx),
            _ => Poll::Ready(Err(NetError::Aborted)),
        })
        .await;
        self.release();
        result
    }

    fn hold_body(&self, body: ResponseBody) {
        self.hold(InFlight::Body {
            body,
            buffer: BytesMut::new(),
        });
    }

    /// Next chunk of the held body. `None` at end of body or once the body
    /// was released.
    async fn next_chunk(&self) -> Option<Result<Bytes, NetError>> {
        poll_fn(|cx| match self.inflight.lock().as_mut() {
            Some(InFlight::Body { body, .. }) => body.poll_next_unpin(cx),
            _ => Poll::Ready(None),
        })
        .await
    }

    fn buffer(&self, chunk: &[u8]) {
        if let Some(InFlight::Body { buffer, .. }) = self.inflight.lock().as_mut() {
            buffer.extend_from_slice(chunk);
        }
    }

    /// Release the body and hand back what was buffered from it.
    fn take_buffered(&self) -> Bytes {
        match self.inflight.lock().take() {
            Some(InFlight::Body { buffer, .. }) => buffer.freeze(),
            _ => Bytes::new(),
        }
    }

    /// Run `f` against the delegate unless the task was cancelled. Returns
    /// `None` when the event was suppressed.
    fn emit<R>(&self, f: impl FnOnce(&mut dyn TaskDelegate) -> R) -> Option<R> {
        let mut guard = self.delegate.lock();
        if self.cancelled.load(Ordering::Acquire) {
            guard.take();
            return None;
        }
        guard.as_mut().map(|d| f(d.as_mut()))
    }

    /// Deliver the terminal event and release the delegate.
    fn finish(&self, f: impl FnOnce(&mut dyn TaskDelegate)) {
        let mut guard = self.delegate.lock();
        let delegate = guard.take();
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        if let Some(mut delegate) = delegate {
            f(delegate.as_mut());
        }
    }

    fn set_state(&self, next: LoadState) {
        let mut state = self.state.lock();
        // A cancelled task may still be running up to its next await.
        if state.is_terminal() {
            return;
        }
        debug_assert!(
            state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            *state,
            next
        );
        *state = next;
    }

    /// Move to a terminal state unless one was already reached.
    fn terminate(&self, next: LoadState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = next;
        true
    }
}

/// Handle to a running task.
///
/// Dropping the handle detaches the task; it keeps running and delivering
/// events.
pub struct TaskHandle {
    shared: Arc<Shared>,
    join: JoinHandle<Result<(), NetError>>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    /// Cancel the task. No delegate event is delivered after this returns
    /// (an event already in progress on another thread finishes first), and
    /// the connection and any buffered body are already released.
    /// A no-op once the task reached a terminal state.
    pub fn cancel(&self) {
        if !self.shared.terminate(LoadState::Cancelled) {
            return;
        }
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.release();
        self.join.abort();
        // Fails only when called from inside a callback of this task; the
        // delegate is then released right after the callback returns.
        if let Some(mut delegate) = self.shared.delegate.try_lock() {
            delegate.take();
        }
        tracing::debug!("task cancelled");
    }

    pub fn state(&self) -> LoadState {
        *self.shared.state.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to end. A cancelled task reports
    /// [`NetError::Aborted`].
    pub async fn wait(self) -> Result<(), NetError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(NetError::Aborted),
            Err(e) => {
                tracing::error!(error = %e, "request task panicked");
                Err(NetError::Aborted)
            }
        }
    }
}

/// Drives one request, including its redirect chain, to a single terminal
/// event. Consumed by [`RequestTask::start`]; never reused.
pub struct RequestTask {
    ctx: RequestContext,
}

impl RequestTask {
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx }
    }

    /// Spawn the task on the current Tokio runtime. `target` is the policy's
    /// answer for the first hop.
    pub fn start<D: TaskDelegate>(
        self,
        request: RequestDescriptor,
        target: ResolvedTarget,
        delegate: D,
    ) -> TaskHandle {
        self.start_boxed(request, target, Box::new(delegate))
    }

    pub fn start_boxed(
        self,
        request: RequestDescriptor,
        target: ResolvedTarget,
        delegate: Box<dyn TaskDelegate>,
    ) -> TaskHandle {
        let shared = Arc::new(Shared {
            cancelled: AtomicBool::new(false),
            state: Mutex::new(LoadState::Created),
            delegate: Mutex::new(Some(delegate)),
            inflight: Mutex::new(None),
        });

        let timeout = request.timeout.unwrap_or(self.ctx.config.default_timeout);
        let task_shared = shared.clone();
        let join = tokio::spawn(async move {
            let shared = task_shared;
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                substituted = target.is_substituted(),
                "task started"
            );

            let outcome = match tokio::time::timeout(timeout, self.run(request, target, &shared)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::debug!(timeout = ?timeout, "task timed out");
                    Err(NetError::TimedOut)
                }
            };
            shared.release();

            match &outcome {
                Ok(()) => {
                    if shared.terminate(LoadState::Completed) {
                        shared.finish(|d| d.on_complete());
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, kind = ?e.kind(), "task failed");
                    if shared.terminate(LoadState::Failed) {
                        let error = e.clone();
                        shared.finish(move |d| d.on_error(error));
                    }
                }
            }
            outcome
        });

        TaskHandle { shared, join }
    }

    async fn run(
        self,
        mut request: RequestDescriptor,
        mut target: ResolvedTarget,
        shared: &Shared,
    ) -> Result<(), NetError> {
        let ctx = self.ctx;
        let mut redirects = 0usize;
        shared.set_state(LoadState::Resolving);

        loop {
            shared.set_state(LoadState::Connecting);
            let url = request.url.clone();
            let logical_url = logical_url(&url, &target);

            let wire = build_wire_request(&request, &target, &logical_url, &ctx)?;
            let connection = shared.connect(ctx.transport.open(ConnectTarget::new(&url, &target)?)).await?;
            let (parts, body) = shared.exchange(connection.send(wire)).await?.into_parts();
            shared.hold_body(body);
            let head = ResponseDescriptor::from_parts(&parts, url.clone());

            shared.set_state(LoadState::HeadersReceived);
            tracing::debug!(url = %url, status = %head.status, "response headers received");
            let stored = ctx.cookie_store.record_set_cookies(&head.headers, &logical_url);
            if !stored.is_empty() {
                tracing::debug!(host = %target.logical_host(), count = stored.len(), "cookies stored");
            }

            if let Some(next_url) = redirect_target(&url, &head) {
                let next_url = next_url?;
                if redirects >= ctx.config.max_redirects {
                    tracing::debug!(limit = ctx.config.max_redirects, "redirect limit reached");
                    return Err(NetError::TooManyRedirects);
                }

                let next = follow_redirect(&request, head.status, next_url);
                match shared.emit(|d| d.on_redirect(&next, &head)) {
                    Some(RedirectAction::Follow) => {
                        // Close this hop before opening the next one.
                        shared.release();
                        redirects += 1;
                        shared.set_state(LoadState::Resolving);
                        tracing::debug!(to = %next.url, hop = redirects, "following redirect");
                        target = resolve_target(ctx.policy.as_ref(), &next.url).await?;
                        request = next;
                        continue;
                    }
                    Some(RedirectAction::Stop) => {}
                    None => return Ok(()),
                }
            }

            let mode = request.body_mode.unwrap_or(ctx.config.default_body_mode);
            return deliver(&request, head, mode, shared).await;
        }
    }
}

/// Emit the final response and the body held in `shared`.
async fn deliver(
    request: &RequestDescriptor,
    head: ResponseDescriptor,
    mode: BodyMode,
    shared: &Shared,
) -> Result<(), NetError> {
    let policy = storage_policy(request, &head);
    if shared.emit(|d| d.on_response(&head, policy)).is_none() {
        return Ok(());
    }
    shared.set_state(LoadState::Streaming);

    match mode {
        BodyMode::Streaming => {
            while let Some(chunk) = shared.next_chunk().await {
                let chunk = chunk?;
                if chunk.is_empty() {
                    continue;
                }
                tracing::trace!(len = chunk.len(), "body chunk");
                if shared.emit(|d| d.on_data(chunk)).is_none() {
                    return Ok(());
                }
            }
        }
        BodyMode::Buffered => {
            while let Some(chunk) = shared.next_chunk().await {
                shared.buffer(&chunk?);
            }
            let bytes = shared.take_buffered();
            if !bytes.is_empty() && shared.emit(|d| d.on_data(bytes)).is_none() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// `url` with its host replaced by the target's logical host.
fn logical_url(url: &Url, target: &ResolvedTarget) -> Url {
    let Some(replacement) = target.replacement_host.as_deref() else {
        return url.clone();
    };
    let mut logical = url.clone();
    if logical.set_host(Some(replacement)).is_err() {
        tracing::warn!(host = %replacement, "invalid replacement host, using original");
        return url.clone();
    }
    logical
}

/// `Host` header value: logical host plus any non-default port.
fn host_header(logical_url: &Url) -> Result<HeaderValue, NetError> {
    let host = logical_url.host_str().ok_or(NetError::InvalidUrl)?;
    let value = match logical_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|_| NetError::InvalidHeader)
}

/// Merge stored cookies into the caller's `Cookie` headers. Caller values
/// win on a name collision.
fn merge_cookies(headers: &mut HeaderMap, stored: &[(String, String)]) -> Result<(), NetError> {
    let caller: Vec<String> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();

    let caller_names: HashSet<&str> = caller
        .iter()
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.split('=').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    let mut pairs: Vec<String> = caller
        .iter()
        .flat_map(|line| line.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(str::to_string)
        .collect();
    pairs.extend(
        stored
            .iter()
            .filter(|(name, _)| !caller_names.contains(name.as_str()))
            .map(|(name, value)| format!("{}={}", name, value)),
    );

    headers.remove(header::COOKIE);
    if !pairs.is_empty() {
        let value = HeaderValue::from_str(&pairs.join("; ")).map_err(|_| NetError::InvalidHeader)?;
        headers.insert(header::COOKIE, value);
    }
    Ok(())
}

fn build_wire_request(
    request: &RequestDescriptor,
    target: &ResolvedTarget,
    logical_url: &Url,
    ctx: &RequestContext,
) -> Result<http::Request<crate::http::RequestBody>, NetError> {
    let mut headers = request.headers.clone();
    headers.insert(header::HOST, host_header(logical_url)?);

    let stored: Vec<(String, String)> = ctx
        .cookie_store
        .cookies_for(logical_url)
        .into_iter()
        .map(|c| (c.name, c.value))
        .collect();
    merge_cookies(&mut headers, &stored)?;

    tracing::trace!(
        host = %target.logical_host(),
        addr = ?target.addr,
        cookies = stored.len(),
        "wire request built"
    );

    let mut wire = http::Request::builder()
        .method(request.method.clone())
        .uri(request.url.as_str())
        .body(request.body.clone())
        .map_err(|_| NetError::InvalidUrl)?;
    *wire.headers_mut() = headers;
    Ok(wire)
}
