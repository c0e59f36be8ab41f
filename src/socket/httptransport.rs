//! HTTP/1.1 transport over plain or TLS sockets.

use crate::base::neterror::NetError;
use crate::dns::{GaiResolver, Resolve};
use crate::http::{HttpBody, RequestBody, ResponseBody};
use crate::socket::client::SocketType;
use crate::socket::connectjob::ConnectJob;
use crate::socket::tls::TlsConfig;
use crate::socket::transport::{ConnectTarget, Connecting, Connection, Exchanging, Transport};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, TryStreamExt};
use http::uri::PathAndQuery;
use http_body_util::BodyExt;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// Default [`Transport`]: one fresh connection per exchange, no pooling.
///
/// Un-substituted targets are resolved with the configured fallback
/// resolver (getaddrinfo unless replaced).
#[derive(Clone, Debug)]
pub struct HttpTransport {
    job: Arc<ConnectJob>,
}

impl HttpTransport {
    pub fn new() -> Result<Self, NetError> {
        Self::with_config(TlsConfig::default(), GaiResolver::new())
    }

    /// Transport with its own TLS settings and fallback resolver, e.g.
    /// [`HickoryResolver`](crate::dns::HickoryResolver) in place of
    /// getaddrinfo.
    pub fn with_config<R: Resolve + 'static>(tls: TlsConfig, resolver: R) -> Result<Self, NetError> {
        Ok(Self {
            job: Arc::new(ConnectJob::new(&tls, Arc::new(resolver))?),
        })
    }
}

impl Transport for HttpTransport {
    fn open(&self, target: ConnectTarget) -> Connecting {
        let job = self.job.clone();
        Box::pin(async move {
            let socket = job.connect(&target).await?;
            Ok(Box::new(H1Connection { socket }) as Box<dyn Connection>)
        })
    }
}

struct H1Connection {
    socket: SocketType,
}

/// Keeps the connection alive while the body is read; dropping it tears
/// the connection down.
struct ConnectionGuard {
    _sender: SendRequest<HttpBody>,
    driver: JoinHandle<()>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Body stream that owns its connection.
struct Guarded {
    inner: BoxStream<'static, Result<Bytes, NetError>>,
    _guard: ConnectionGuard,
}

impl Stream for Guarded {
    type Item = Result<Bytes, NetError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Connection for H1Connection {
    fn send(self: Box<Self>, request: http::Request<RequestBody>) -> Exchanging {
        Box::pin(async move {
            let (mut sender, conn) = http1::handshake(TokioIo::new(self.socket))
                .await
                .map_err(|e| NetError::from_hyper(&e))?;

            let driver = tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(error = %e, "connection closed with error");
                }
            });

            let (mut parts, body) = request.into_parts();
            // Origin-form request target; the authority travels in Host.
            let origin_form = parts
                .uri
                .path_and_query()
                .cloned()
                .unwrap_or_else(|| PathAndQuery::from_static("/"));
            parts.uri = http::Uri::from(origin_form);

            let request = http::Request::from_parts(parts, body.into_http_body()?);
            let response = match sender.send_request(request).await {
                Ok(response) => response,
                Err(e) => {
                    driver.abort();
                    return Err(NetError::from_hyper(&e));
                }
            };

            let (parts, incoming) = response.into_parts();
            let guard = ConnectionGuard {
                _sender: sender,
                driver,
            };
            let data: BoxStream<'static, Result<Bytes, NetError>> = Box::pin(TryStreamExt::map_err(
                incoming.into_data_stream(),
                |e| NetError::from_hyper(&e),
            ));

            Ok(http::Response::from_parts(
                parts,
                ResponseBody::new(Guarded {
                    inner: data,
                    _guard: guard,
                }),
            ))
        })
    }
}
