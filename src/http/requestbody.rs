//! Request body for POST/PUT operations.
//!
//! A body is either held in memory, and can be sent any number of times, or
//! a lazy byte stream that can be sent exactly once. Clones of a streamed
//! body share the same stream, so whichever clone is sent first consumes it.

use crate::base::neterror::NetError;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use http_body::Frame;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use parking_lot::Mutex;
use std::sync::Arc;

/// Body type handed to the HTTP connection.
pub type HttpBody = UnsyncBoxBody<Bytes, NetError>;

/// A lazily produced body that can be taken once.
#[derive(Clone)]
pub struct OneShotStream {
    inner: Arc<Mutex<Option<BoxStream<'static, Result<Bytes, NetError>>>>>,
}

impl OneShotStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(stream.boxed()))),
        }
    }

    /// Take the stream out. Returns `None` once it has been taken.
    pub fn take(&self) -> Option<BoxStream<'static, Result<Bytes, NetError>>> {
        self.inner.lock().take()
    }

    pub fn is_consumed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

impl std::fmt::Debug for OneShotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneShotStream")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Request body for HTTP methods that send data.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes.
    Bytes(Bytes),
    /// Lazily produced body of unknown length.
    Stream(OneShotStream),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Bytes(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<()> for RequestBody {
    fn from(_: ()) -> Self {
        RequestBody::Empty
    }
}

impl RequestBody {
    /// Body read lazily from `stream`.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        RequestBody::Stream(OneShotStream::new(stream))
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }

    /// Length in bytes, when known up front.
    pub fn len(&self) -> Option<usize> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Bytes(b) => Some(b.len()),
            RequestBody::Stream(_) => None,
        }
    }

    /// Whether the body can still be sent.
    pub fn is_sendable(&self) -> bool {
        match self {
            RequestBody::Stream(s) => !s.is_consumed(),
            _ => true,
        }
    }

    /// Convert into a body for the wire, consuming a streamed body.
    pub fn into_http_body(self) -> Result<HttpBody, NetError> {
        match self {
            RequestBody::Empty => Ok(Empty::<Bytes>::new()
                .map_err(|never| match never {})
                .boxed_unsync()),
            RequestBody::Bytes(b) => Ok(Full::new(b).map_err(|never| match never {}).boxed_unsync()),
            RequestBody::Stream(s) => {
                let stream = s.take().ok_or(NetError::BodyNotReplayable)?;
                Ok(StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync())
            }
        }
    }

    /// Drain the body into memory, consuming a streamed body.
    pub async fn collect(self) -> Result<Bytes, NetError> {
        let body = self.into_http_body()?;
        Ok(body.collect().await?.to_bytes())
    }
}
