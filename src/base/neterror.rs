use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Coarse error classification surfaced to callers.
///
/// Every [`NetError`] maps onto exactly one kind via [`NetError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The resolution provider had no answer. Never surfaced as a task
    /// failure: the policy layer turns it into "no substitution".
    ResolutionUnavailable,
    /// The transport could not establish a connection.
    ConnectionFailed,
    /// Certificate validation against the asserted hostname failed.
    TlsIdentityMismatch,
    Timeout,
    TooManyRedirects,
    /// Unparseable status line, headers, body framing or redirect target.
    MalformedResponse,
    Cancelled,
    /// The request itself cannot be sent (bad URL, unreplayable body).
    InvalidRequest,
}

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name not resolved for {domain}: {source}")]
    NameNotResolvedFor {
        domain: String,
        #[source]
        source: Arc<io::Error>,
    },

    // TLS Errors
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Certificate for {host} rejected: {reason}")]
    CertificateNameMismatch { host: String, reason: String },

    // Timing
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Request timed out")]
    TimedOut,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Error reading response body")]
    HttpBodyError,
    #[error("Request body was streamed and cannot be sent again")]
    BodyNotReplayable,

    // Lifecycle
    #[error("Request aborted")]
    Aborted,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn connection_failed_to(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        NetError::ConnectionFailedTo {
            host: host.into(),
            port,
            source: Arc::new(source),
        }
    }

    pub fn dns_failed(domain: impl Into<String>, source: io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.into(),
            source: Arc::new(source),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        NetError::Config {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => {
                ErrorKind::ResolutionUnavailable
            }
            NetError::ConnectionClosed
            | NetError::ConnectionReset
            | NetError::ConnectionRefused
            | NetError::ConnectionFailed
            | NetError::ConnectionFailedTo { .. }
            | NetError::AddressUnreachable
            | NetError::SslProtocolError => ErrorKind::ConnectionFailed,
            NetError::CertificateNameMismatch { .. } => ErrorKind::TlsIdentityMismatch,
            NetError::ConnectionTimedOut | NetError::TimedOut => ErrorKind::Timeout,
            NetError::TooManyRedirects => ErrorKind::TooManyRedirects,
            NetError::InvalidRedirect
            | NetError::InvalidHttpResponse
            | NetError::EmptyResponse
            | NetError::HttpBodyError => ErrorKind::MalformedResponse,
            NetError::Aborted => ErrorKind::Cancelled,
            NetError::InvalidUrl
            | NetError::UnknownUrlScheme
            | NetError::InvalidHeader
            | NetError::BodyNotReplayable
            | NetError::Config { .. }
            | NetError::Unknown(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Chromium `net_error_list.h` code for this error.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::Aborted => -3,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::AddressUnreachable => -109,
            NetError::ConnectionTimedOut => -118,
            NetError::TimedOut => -7,
            NetError::CertificateNameMismatch { .. } => -200,
            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidRedirect => -303,
            NetError::TooManyRedirects => -310,
            NetError::EmptyResponse => -324,
            NetError::InvalidHttpResponse => -370,
            NetError::HttpBodyError => -320,
            NetError::InvalidHeader => -905,
            NetError::BodyNotReplayable => -906,
            NetError::Config { .. } => -907,
            NetError::Unknown(code) => *code,
        }
    }

    /// Map a hyper error raised while exchanging a request.
    pub fn from_hyper(err: &hyper::Error) -> Self {
        if err.is_parse() || err.is_parse_status() {
            NetError::InvalidHttpResponse
        } else if err.is_incomplete_message() {
            NetError::EmptyResponse
        } else if err.is_timeout() {
            NetError::ConnectionTimedOut
        } else if err.is_canceled() {
            NetError::Aborted
        } else if err.is_body_write_aborted() || err.is_user() {
            NetError::HttpBodyError
        } else {
            NetError::ConnectionClosed
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -3 => NetError::Aborted,
            -7 => NetError::TimedOut,
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -109 => NetError::AddressUnreachable,
            -118 => NetError::ConnectionTimedOut,
            -300 => NetError::InvalidUrl,
            -302 => NetError::UnknownUrlScheme,
            -303 => NetError::InvalidRedirect,
            -310 => NetError::TooManyRedirects,
            -320 => NetError::HttpBodyError,
            -324 => NetError::EmptyResponse,
            -370 => NetError::InvalidHttpResponse,
            -905 => NetError::InvalidHeader,
            -906 => NetError::BodyNotReplayable,
            _ => NetError::Unknown(code),
        }
    }
}
