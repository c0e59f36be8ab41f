//! Response body streaming.
//!
//! A finite, non-restartable sequence of chunks. The body owns whatever
//! keeps the underlying connection alive, so dropping it closes the
//! connection.

use crate::base::neterror::NetError;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Response body wrapper for streaming.
pub struct ResponseBody {
    inner: BoxStream<'static, Result<Bytes, NetError>>,
}

impl ResponseBody {
    /// Create a new response body wrapper.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    pub fn empty() -> Self {
        Self::new(futures::stream::empty())
    }

    /// Body made of the given chunks, in order.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(chunks.into_iter().map(Ok)))
    }

    /// Next chunk, or `None` at end of body.
    pub async fn chunk(&mut self) -> Option<Result<Bytes, NetError>> {
        self.inner.next().await
    }

    /// Read entire body as bytes.
    pub async fn bytes(mut self) -> Result<Bytes, NetError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read body as UTF-8 string.
    pub async fn text(self) -> Result<String, NetError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| NetError::HttpBodyError)
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, NetError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}
