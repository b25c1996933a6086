//! Pass-through relay of streaming upstream bodies.
//!
//! Provides [`RelayStream`], which forwards upstream chunks to the client one
//! at a time, in arrival order, without buffering. Dropping it (for example
//! because the client went away) drops the upstream body and releases the
//! upstream connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::error::{Error, Result};

/// How a relayed stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Upstream finished normally.
    Completed,
    /// Upstream failed after bytes had been forwarded.
    UpstreamError,
    /// Dropped before upstream finished, typically a client disconnect.
    Cancelled,
}

impl std::fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEnd::Completed => write!(f, "completed"),
            StreamEnd::UpstreamError => write!(f, "upstream_error"),
            StreamEnd::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Byte stream piped from upstream to client.
pub struct RelayStream {
    upstream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    /// First chunk, read before response headers were committed.
    first: Option<Bytes>,
    destination_id: String,
    chunks: u64,
    bytes: u64,
    end: Option<StreamEnd>,
}

impl RelayStream {
    /// Start relaying `upstream`, waiting for its first chunk.
    ///
    /// A failure on that first read is returned as `UpstreamConnection` so
    /// the caller can still answer with a structured error.
    pub async fn start<S>(upstream: S, destination_id: impl Into<String>) -> Result<Self>
    where
        S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    {
        let destination_id = destination_id.into();
        let mut upstream = upstream.boxed();

        let first = match upstream.next().await {
            Some(Ok(chunk)) => Some(chunk),
            Some(Err(e)) => {
                tracing::error!(
                    destination = %destination_id,
                    error = %e,
                    "Upstream stream failed before first chunk"
                );
                return Err(Error::UpstreamConnection(format!(
                    "Upstream stream failed: {}",
                    e
                )));
            }
            None => None,
        };

        let mut stream = Self {
            upstream: Some(upstream),
            first,
            destination_id,
            chunks: 0,
            bytes: 0,
            end: None,
        };
        if stream.first.is_none() {
            stream.finish(StreamEnd::Completed);
        }
        Ok(stream)
    }

    /// How the stream ended, `None` while it is still open.
    pub fn end(&self) -> Option<StreamEnd> {
        self.end
    }

    fn record(&mut self, chunk: &Bytes) {
        self.chunks += 1;
        self.bytes += chunk.len() as u64;
    }

    /// Release the upstream and log a one-line summary.
    fn finish(&mut self, end: StreamEnd) {
        if self.end.is_some() {
            return;
        }
        self.end = Some(end);
        self.upstream = None;
        self.first = None;

        match end {
            StreamEnd::Completed => tracing::info!(
                destination = %self.destination_id,
                chunks = self.chunks,
                bytes = self.bytes,
                end = %end,
                "Stream relay finished"
            ),
            StreamEnd::UpstreamError | StreamEnd::Cancelled => tracing::warn!(
                destination = %self.destination_id,
                chunks = self.chunks,
                bytes = self.bytes,
                end = %end,
                "Stream relay ended early"
            ),
        }
    }
}

impl Stream for RelayStream {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(chunk) = this.first.take() {
            this.record(&chunk);
            return Poll::Ready(Some(Ok(chunk)));
        }

        let Some(upstream) = this.upstream.as_mut() else {
            return Poll::Ready(None);
        };

        match upstream.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.record(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!(
                    destination = %this.destination_id,
                    error = %e,
                    "Error streaming from upstream"
                );
                this.finish(StreamEnd::UpstreamError);
                Poll::Ready(Some(Err(std::io::Error::other(e))))
            }
            Poll::Ready(None) => {
                this.finish(StreamEnd::Completed);
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.end.is_none() {
            self.finish(StreamEnd::Cancelled);
        }
    }
}
