//! Connection establishment and the transport interface.
//!
//! - [`transport`]: the `Transport` / `Connection` traits tasks talk to
//! - [`connectjob`]: address selection → TCP → TLS
//! - [`httptransport`]: HTTP/1.1 implementation of `Transport`
//! - [`tls`]: TLS configuration with BoringSSL

pub mod client;
pub mod connectjob;
pub mod httptransport;
pub mod tls;
pub mod transport;

pub use client::SocketType;
pub use httptransport::HttpTransport;
pub use tls::TlsConfig;
pub use transport::{ConnectTarget, Connecting, Connection, Exchanging, Transport};
