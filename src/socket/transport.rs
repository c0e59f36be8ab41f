//! Transport interface consumed by request tasks.
//!
//! `open` establishes a connection to a destination, asserting a TLS
//! identity that may differ from the literal address. `send` writes one
//! request and yields the response head with a lazy body; the body owns the
//! connection, so dropping it closes the connection.

use crate::base::neterror::NetError;
use crate::http::{RequestBody, ResponseBody};
use crate::policy::ResolvedTarget;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use url::Url;

/// Where and how to connect for one hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub tls: bool,
    /// Host from the URL, resolved normally when `addr` is `None`.
    pub host: String,
    /// Substituted address to connect to.
    pub addr: Option<IpAddr>,
    pub port: u16,
    /// Name the server certificate is verified against.
    pub tls_identity: String,
}

impl ConnectTarget {
    pub fn new(url: &Url, resolved: &ResolvedTarget) -> Result<Self, NetError> {
        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(NetError::UnknownUrlScheme),
        };
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        Ok(Self {
            tls,
            host: resolved.host.clone(),
            addr: resolved.addr,
            port,
            tls_identity: resolved.logical_host().to_string(),
        })
    }

    /// Literal socket address when an IP was substituted.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr.map(|ip| SocketAddr::new(ip, self.port))
    }
}

pub type Connecting = Pin<Box<dyn Future<Output = Result<Box<dyn Connection>, NetError>> + Send>>;

pub type Exchanging =
    Pin<Box<dyn Future<Output = Result<http::Response<ResponseBody>, NetError>> + Send>>;

/// Opens connections.
pub trait Transport: Send + Sync {
    fn open(&self, target: ConnectTarget) -> Connecting;
}

/// One open connection, used for exactly one exchange.
///
/// The request carries an absolute URI and an explicit `Host` header; the
/// connection decides how to put them on the wire.
pub trait Connection: Send {
    fn send(self: Box<Self>, request: http::Request<RequestBody>) -> Exchanging;
}
