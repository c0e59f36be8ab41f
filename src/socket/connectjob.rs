use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{Name, Resolve};
use crate::socket::client::SocketType;
use crate::socket::tls::TlsConfig;
use crate::socket::transport::ConnectTarget;
use boring::ssl::SslConnector;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Manages the connection process: address selection -> TCP -> TLS.
///
/// With a substituted address the job connects straight to it. Without
/// one it resolves the URL host through the fallback resolver and tries
/// each address in turn. The TLS handshake always asserts
/// `target.tls_identity`, never the literal address.
pub struct ConnectJob {
    connector: SslConnector,
    resolver: Arc<dyn Resolve>,
}

impl std::fmt::Debug for ConnectJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectJob").finish_non_exhaustive()
    }
}

impl ConnectJob {
    pub fn new(tls: &TlsConfig, resolver: Arc<dyn Resolve>) -> Result<Self, NetError> {
        Ok(Self {
            connector: tls.build_connector()?,
            resolver,
        })
    }

    pub async fn connect(&self, target: &ConnectTarget) -> Result<SocketType, NetError> {
        let stream = self.connect_tcp(target).await?;
        if !target.tls {
            return Ok(SocketType::Tcp(stream));
        }
        self.handshake(target, stream).await
    }

    async fn candidates(&self, target: &ConnectTarget) -> Result<Vec<SocketAddr>, NetError> {
        if let Some(addr) = target.socket_addr() {
            return Ok(vec![addr]);
        }

        // Normal resolution failing means the destination is unreachable;
        // only the policy's provider is allowed to come up empty silently.
        let unreachable = |reason: String| {
            NetError::connection_failed_to(
                target.host.clone(),
                target.port,
                io::Error::new(io::ErrorKind::NotFound, reason),
            )
        };

        let addrs: Vec<SocketAddr> = self
            .resolver
            .resolve(Name::new(target.host.as_str()))
            .await
            .map_err(|e| unreachable(e.to_string()))?
            .map(|a| SocketAddr::new(a.ip(), target.port))
            .collect();

        if addrs.is_empty() {
            return Err(unreachable("no addresses".to_string()));
        }
        Ok(addrs)
    }

    async fn connect_tcp(&self, target: &ConnectTarget) -> Result<TcpStream, NetError> {
        let mut last_err = NetError::ConnectionFailed;

        for addr in self.candidates(target).await? {
            tracing::debug!(
                host = %target.host,
                addr = %addr,
                substituted = target.addr.is_some(),
                "connecting"
            );
            match TcpStream::connect(addr)
                .await
                .connection_context(&addr.ip().to_string(), addr.port())
            {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "connect attempt failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn handshake(&self, target: &ConnectTarget, stream: TcpStream) -> Result<SocketType, NetError> {
        let mut config = self
            .connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        config.set_use_server_name_indication(TlsConfig::should_set_sni(&target.tls_identity));

        match tokio_boring::connect(config, &target.tls_identity, stream).await {
            Ok(tls) => {
                tracing::debug!(identity = %target.tls_identity, "TLS handshake complete");
                Ok(SocketType::Ssl(tls))
            }
            Err(e) => {
                match e.ssl().map(|ssl| ssl.verify_result()) {
                    Some(Err(verify)) => {
                        tracing::warn!(
                            identity = %target.tls_identity,
                            reason = %verify.error_string(),
                            "certificate rejected"
                        );
                        Err(NetError::CertificateNameMismatch {
                            host: target.tls_identity.clone(),
                            reason: verify.error_string().to_string(),
                        })
                    }
                    _ => {
                        tracing::debug!(identity = %target.tls_identity, error = %e, "TLS handshake failed");
                        Err(NetError::SslProtocolError)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::neterror::ErrorKind;
    use crate::dns::StaticResolver;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    fn job(resolver: StaticResolver) -> ConnectJob {
        ConnectJob::new(&TlsConfig::default(), Arc::new(resolver)).unwrap()
    }

    #[tokio::test]
    async fn test_connects_to_substituted_addr() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let target = ConnectTarget {
            tls: false,
            host: "unresolvable.example".to_string(),
            addr: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port,
            tls_identity: "unresolvable.example".to_string(),
        };
        let socket = job(StaticResolver::default()).connect(&target).await.unwrap();
        assert!(!socket.is_tls());
        assert_eq!(socket.tcp().peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_fallback_resolution_without_answer() {
        let target = ConnectTarget {
            tls: false,
            host: "nowhere.example".to_string(),
            addr: None,
            port: 80,
            tls_identity: "nowhere.example".to_string(),
        };
        let err = job(StaticResolver::default()).connect(&target).await.unwrap_err();
        assert!(matches!(err, NetError::ConnectionFailedTo { .. }));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_tls_against_plain_server_fails() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            }
        });

        let target = ConnectTarget {
            tls: true,
            host: "secure.example".to_string(),
            addr: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port,
            tls_identity: "secure.example".to_string(),
        };
        let err = job(StaticResolver::default()).connect(&target).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }
}
