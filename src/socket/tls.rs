use crate::base::neterror::NetError;
use boring::ssl::{
    SslConnector, SslConnectorBuilder, SslFiletype, SslMethod, SslVerifyMode, SslVersion,
};
use std::path::PathBuf;

/// TLS settings for origin connections.
///
/// Only HTTP/1.1 is offered over ALPN since that is the only protocol the
/// transport speaks.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    pub cipher_list: String,
    pub alpn_protos: Vec<String>,
    pub curves: Vec<String>, // Curve names like "X25519", "P-256"
    /// Extra trust anchors (PEM). The system store is always loaded.
    pub ca_file: Option<PathBuf>,
    /// Client certificate chain and key (PEM) for mutual TLS.
    pub client_identity: Option<(PathBuf, PathBuf)>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            cipher_list:
                "TLS_AES_128_GCM_SHA256:TLS_AES_256_GCM_SHA384:TLS_CHACHA20_POLY1305_SHA256:\
                ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
                ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
                ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305"
                    .to_string(),
            alpn_protos: vec!["http/1.1".to_string()],
            curves: vec!["X25519".to_string(), "P-256".to_string(), "P-384".to_string()],
            ca_file: None,
            client_identity: None,
        }
    }
}

impl TlsConfig {
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Build a connector. Peer verification is always on; a certificate
    /// that does not match the asserted hostname fails the handshake.
    pub fn build_connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        self.apply_to_builder(&mut builder)?;
        Ok(builder.build())
    }

    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        // Set TLS versions
        if let Some(min) = self.min_version {
            builder.set_min_proto_version(Some(min)).map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder.set_max_proto_version(Some(max)).map_err(|_| NetError::SslProtocolError)?;
        }

        builder.set_cipher_list(&self.cipher_list).map_err(|_| NetError::SslProtocolError)?;

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&Self::alpn_wire(&self.alpn_protos)?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.curves.is_empty() {
            builder
                .set_curves_list(&self.curves.join(":"))
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if let Some(ca) = &self.ca_file {
            builder.set_ca_file(ca).map_err(|e| {
                NetError::config(format!("cannot load CA file {}: {}", ca.display(), e))
            })?;
        }

        if let Some((chain, key)) = &self.client_identity {
            builder.set_certificate_chain_file(chain).map_err(|e| {
                NetError::config(format!("cannot load certificate {}: {}", chain.display(), e))
            })?;
            builder
                .set_private_key_file(key, SslFiletype::PEM)
                .map_err(|e| NetError::config(format!("cannot load key {}: {}", key.display(), e)))?;
        }

        builder.set_verify(SslVerifyMode::PEER);
        Ok(())
    }

    /// Length-prefixed ALPN wire format.
    fn alpn_wire(protos: &[String]) -> Result<Vec<u8>, NetError> {
        let mut wire = Vec::new();
        for proto in protos {
            let len = u8::try_from(proto.len()).map_err(|_| NetError::SslProtocolError)?;
            wire.push(len);
            wire.extend_from_slice(proto.as_bytes());
        }
        Ok(wire)
    }

    /// Check if SNI (Server Name Indication) should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        crate::dns::ip_literal(host).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sni_not_set_for_ip() {
        assert!(TlsConfig::should_set_sni("example.com"));
        assert!(!TlsConfig::should_set_sni("203.0.113.7"));
        assert!(!TlsConfig::should_set_sni("[2001:db8::1]"));
    }

    #[test]
    fn test_alpn_wire() {
        let wire = TlsConfig::alpn_wire(&["http/1.1".to_string()]).unwrap();
        assert_eq!(wire, b"\x08http/1.1");
    }

    #[test]
    fn test_default_connector_builds() {
        assert!(TlsConfig::default().build_connector().is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let err = TlsConfig::default()
            .with_ca_file("/nonexistent/ca.pem")
            .build_connector()
            .unwrap_err();
        assert!(matches!(err, NetError::Config { .. }));
    }
}
