// Request dispatch
//
// Turns a path plus `RequestOptions` into one HTTP exchange and routes the
// response through the chosen strategy: buffered and normalized, split into
// an event stream, or handed back as opaque bytes.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, Response};
use tracing::debug;
use url::Url;

use crate::client::Client;
use crate::error::Error;
use crate::normalize::{Normalized, RawResponse, normalize};
use crate::options::{RequestOptions, Strategy, TransportParams, select_strategy};
use crate::splitter::Framing;
use crate::stream::{EventStream, OpaqueStream};

// ── Outgoing ─────────────────────────────────────────────────────────

/// A fully resolved request that can be rebuilt for auth retries.
#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub method: Method,
    /// Absolute locator including pass-through query parameters.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Whole-request deadline; `None` for streaming strategies.
    pub timeout: Option<Duration>,
}

impl Outgoing {
    pub fn new(method: Method, mut url: Url, transport: TransportParams) -> Self {
        if !transport.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&transport.query);
        }
        Self {
            method,
            url,
            headers: transport.headers,
            body: transport.body,
            timeout: None,
        }
    }

    pub fn request(&self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = http
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

// ── Reply ────────────────────────────────────────────────────────────

/// Result of a dispatched request, shaped by the strategy that handled it.
#[derive(Debug)]
pub enum Reply {
    Body(Normalized),
    Events(EventStream),
    Opaque(OpaqueStream),
}

impl Reply {
    pub fn into_body(self) -> Option<Normalized> {
        match self {
            Self::Body(body) => Some(body),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<EventStream> {
        match self {
            Self::Events(events) => Some(events),
            _ => None,
        }
    }

    pub fn into_opaque(self) -> Option<OpaqueStream> {
        match self {
            Self::Opaque(chunks) => Some(chunks),
            _ => None,
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

impl Client {
    /// Issue one request for `segments` under the client's prefix.
    ///
    /// The HTTP method is mandatory. `Stream` and `OpaqueData` are honored
    /// for GET only; other methods get a buffered reply. Non-2xx statuses
    /// fail with [`Error::Http`] before any body is consumed by a stream.
    pub async fn dispatch(&self, segments: &[String], options: RequestOptions) -> Result<Reply, Error> {
        let RequestOptions {
            method,
            present,
            return_type,
            timeout,
            max_events,
            transport,
        } = options;

        let method = method.ok_or_else(|| Error::Configuration("method is required".into()))?;
        let strategy = select_strategy(&method, return_type);
        let timeout = timeout.unwrap_or_else(|| self.timeout());
        let mut outgoing = Outgoing::new(method, self.locator(segments)?, transport);

        debug!(
            method = %outgoing.method,
            url = %outgoing.url,
            ?strategy,
            "dispatching request"
        );

        match strategy {
            Strategy::Buffered => {
                outgoing.timeout = Some(timeout);
                let response = check_status(self.send_within(&outgoing, timeout).await?).await?;
                let text = response.text().await?;
                Ok(Reply::Body(normalize(RawResponse::Text(text), present)?))
            }
            Strategy::Stream => {
                let response = check_status(self.send_within(&outgoing, timeout).await?).await?;
                let framing = Framing::from_content_type(content_type(&response).as_deref());
                debug!(?framing, "opening event stream");
                let events = EventStream::from_chunks(response.bytes_stream(), framing, present);
                Ok(Reply::Events(match max_events {
                    Some(limit) => events.limit(limit),
                    None => events,
                }))
            }
            Strategy::Opaque => {
                let response = check_status(self.send_within(&outgoing, timeout).await?).await?;
                let content_type = content_type(&response);
                Ok(Reply::Opaque(OpaqueStream::from_chunks(
                    response.bytes_stream(),
                    content_type,
                )))
            }
        }
    }

    /// Send with a deadline on the response headers. Buffered requests
    /// also carry it as a whole-request timeout; streaming bodies don't.
    async fn send_within(&self, outgoing: &Outgoing, timeout: Duration) -> Result<Response, Error> {
        tokio::time::timeout(timeout, self.send_authorized(outgoing))
            .await
            .map_err(|_| Error::Timeout { timeout })?
    }
}

async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), %url, "request failed");
    Err(Error::Http {
        status: status.as_u16(),
        url,
        body,
    })
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
