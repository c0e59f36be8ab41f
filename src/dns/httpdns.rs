//! HTTPDNS provider speaking the DNSPod "D+" HTTP API.
//!
//! A lookup is a plain `GET /d?dn=<host>&ttl=1` against a server addressed
//! by IP literal, answered with a text body such as
//! `119.29.29.29;182.254.116.116,300` (addresses separated by `;`, an
//! optional TTL after `,`). Because the server is an IP literal, this
//! bootstrap traffic never needs DNS and is never intercepted itself.

use super::{Addrs, Answer, Answering, Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use bytes::Bytes;
use http::{header, Request};
use http_body_util::{BodyExt, Empty, Limited};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

/// Public DNSPod D+ endpoint.
pub const DEFAULT_SERVER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(119, 29, 29, 29)), 80);

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

// A D+ answer is a short line of addresses.
const MAX_ANSWER_BYTES: usize = 4096;

/// Parse a D+ response body. Entries that are not IP addresses are skipped;
/// an empty or garbage body yields an empty answer.
pub fn parse_dplus(body: &str) -> Answer {
    let body = body.trim();
    let (ips, ttl) = match body.split_once(',') {
        Some((ips, ttl)) => (ips, ttl.trim().parse::<u64>().ok().map(Duration::from_secs)),
        None => (body, None),
    };

    let addrs = ips
        .split(';')
        .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
        .collect();

    Answer { addrs, ttl }
}

/// Resolution provider backed by a D+ HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpDnsResolver {
    server: SocketAddr,
    timeout: Duration,
}

impl Default for HttpDnsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER)
    }
}

impl HttpDnsResolver {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The lookup server; callers add its host to their bypass list.
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Query the server for `host`.
    pub async fn lookup(&self, host: &str) -> Result<Answer, NetError> {
        match tokio::time::timeout(self.timeout, self.query(host)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(host = %host, server = %self.server, "HTTPDNS lookup timed out");
                Err(NetError::ConnectionTimedOut)
            }
        }
    }

    async fn query(&self, host: &str) -> Result<Answer, NetError> {
        let stream = TcpStream::connect(self.server)
            .await
            .connection_context(&self.server.ip().to_string(), self.server.port())?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| NetError::from_hyper(&e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "HTTPDNS connection closed with error");
            }
        });

        let dn: String = url::form_urlencoded::byte_serialize(host.as_bytes()).collect();
        let req = Request::get(format!("/d?dn={}&ttl=1", dn))
            .header(header::HOST, self.server.to_string())
            .header(header::CONNECTION, "close")
            .body(Empty::<Bytes>::new())
            .map_err(|_| NetError::InvalidUrl)?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| NetError::from_hyper(&e))?;

        if !resp.status().is_success() {
            tracing::warn!(host = %host, status = %resp.status(), "HTTPDNS server rejected lookup");
            return Err(NetError::InvalidHttpResponse);
        }

        let body = Limited::new(resp.into_body(), MAX_ANSWER_BYTES)
            .collect()
            .await
            .map_err(|e| {
                tracing::warn!(host = %host, error = %e, "HTTPDNS answer unreadable or too large");
                NetError::InvalidHttpResponse
            })?
            .to_bytes();

        let answer = parse_dplus(&String::from_utf8_lossy(&body));
        tracing::debug!(
            host = %host,
            count = answer.addrs.len(),
            ttl = ?answer.ttl,
            "HTTPDNS lookup complete"
        );
        Ok(answer)
    }
}

impl Resolve for HttpDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let answer = resolver.lookup(name.as_str()).await?;
            let addrs: Vec<SocketAddr> = answer
                .addrs
                .into_iter()
                .map(|ip| SocketAddr::new(ip, 0))
                .collect();
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }

    fn resolve_answer(&self, name: Name) -> Answering {
        let resolver = self.clone();
        Box::pin(async move { resolver.lookup(name.as_str()).await })
    }
}
