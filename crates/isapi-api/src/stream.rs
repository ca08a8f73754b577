//! Lazy streams over long-lived responses.
//!
//! [`EventStream`] yields one normalized document per event pushed by the
//! device, for as long as the connection stays open. [`OpaqueStream`] yields
//! the raw body chunks untouched.
//!
//! Dropping either stream drops the underlying response and releases the
//! connection. [`EventStream::cancel_on`] and [`OpaqueStream::cancel_on`]
//! additionally end the stream as soon as a [`CancellationToken`] fires.
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//!
//! let mut alerts = client.at("Event/notification/alertStream").stream().await?;
//! while let Some(event) = alerts.next().await {
//!     println!("{}", event?.into_value());
//! }
//! ```

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::normalize::{Normalized, Presentation, RawResponse, normalize};
use crate::splitter::{EventSplitter, Framing};

/// Event documents as raw XML strings, before normalization.
pub type RawEvents = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

type Chunks = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

// ── EventStream ──────────────────────────────────────────────────────

/// Unbounded stream of normalized events, in arrival order.
pub struct EventStream {
    raw: RawEvents,
    present: Presentation,
}

impl EventStream {
    /// Split a chunked body into events with the given framing.
    pub fn from_chunks<S, E>(chunks: S, framing: Framing, present: Presentation) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Error> + Send + 'static,
    {
        Self {
            raw: Box::pin(split_events(chunks, framing)),
            present,
        }
    }

    pub fn presentation(&self) -> Presentation {
        self.present
    }

    /// End the stream after `n` events.
    pub fn limit(self, n: usize) -> Self {
        Self {
            raw: Box::pin(self.raw.take(n)),
            present: self.present,
        }
    }

    /// End the stream when `token` is cancelled, without waiting for the
    /// next event.
    pub fn cancel_on(self, token: CancellationToken) -> Self {
        Self {
            raw: Box::pin(self.raw.take_until(token.cancelled_owned())),
            present: self.present,
        }
    }

    /// The undecoded event documents.
    pub fn into_raw(self) -> RawEvents {
        self.raw
    }

    /// Collect up to `n` events and normalize them together: one document
    /// per event in dict mode, or their concatenation in text mode.
    pub async fn take_events(self, n: usize) -> Result<Normalized, Error> {
        let present = self.present;
        let mut raw = self.raw.take(n);
        let mut fragments = Vec::with_capacity(n.min(64));
        while let Some(event) = raw.next().await {
            fragments.push(event?);
        }
        normalize(RawResponse::Fragments(fragments), present)
    }
}

fn split_events<S, E>(chunks: S, framing: Framing) -> impl Stream<Item = Result<String, Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    try_stream! {
        let mut splitter = EventSplitter::new(framing);
        let mut chunks = Box::pin(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(Into::<Error>::into)?;
            let events: Vec<String> = splitter.push(&chunk)?.collect();
            for event in events {
                yield event;
            }
        }
        if let Some(event) = splitter.finish()? {
            yield event;
        }
    }
}

impl Stream for EventStream {
    type Item = Result<Normalized, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let present = self.present;
        self.raw.as_mut().poll_next(cx).map(|item| {
            item.map(|event| event.and_then(|xml| normalize(RawResponse::Text(xml), present)))
        })
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("present", &self.present)
            .finish_non_exhaustive()
    }
}

// ── OpaqueStream ─────────────────────────────────────────────────────

/// Raw response body chunks, in order, with no interpretation.
pub struct OpaqueStream {
    chunks: Chunks,
    content_type: Option<String>,
}

impl OpaqueStream {
    pub fn from_chunks<S, E>(chunks: S, content_type: Option<String>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Error> + Send + 'static,
    {
        Self {
            chunks: Box::pin(chunks.map(|chunk| chunk.map_err(Into::<Error>::into))),
            content_type,
        }
    }

    /// `Content-Type` announced by the device, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn cancel_on(self, token: CancellationToken) -> Self {
        Self {
            chunks: Box::pin(self.chunks.take_until(token.cancelled_owned())),
            content_type: self.content_type,
        }
    }

    /// Read the rest of the body into memory.
    pub async fn collect_bytes(mut self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.chunks.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body.freeze())
    }
}

impl Stream for OpaqueStream {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for OpaqueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueStream")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
