// Per-request options and strategy selection.
//
// Everything a caller can say about one invocation lives in
// `RequestOptions`: which HTTP method, how to present the reply, how to
// consume the body, and what to forward verbatim to the transport.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::error::Error;
use crate::normalize::Presentation;

// ── ReturnType ───────────────────────────────────────────────────────

/// How the response body should be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    /// Read the whole body, then normalize it.
    #[default]
    Buffered,
    /// Multipart event stream, one normalized event at a time.
    Stream,
    /// Raw body chunks (snapshots, recordings).
    OpaqueData,
}

impl From<&str> for ReturnType {
    /// Unknown names select [`ReturnType::Buffered`].
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "stream" => Self::Stream,
            "opaque_data" | "opaque-data" | "opaque" => Self::OpaqueData,
            _ => Self::Buffered,
        }
    }
}

/// Strategy actually used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Buffered,
    Stream,
    Opaque,
}

/// Streaming strategies apply to GET only; every other method is buffered.
pub fn select_strategy(method: &Method, return_type: ReturnType) -> Strategy {
    match (return_type, *method == Method::GET) {
        (ReturnType::Buffered, _) => Strategy::Buffered,
        (ReturnType::Stream, true) => Strategy::Stream,
        (ReturnType::OpaqueData, true) => Strategy::Opaque,
        (requested, false) => {
            warn!(
                %method,
                ?requested,
                "streaming return types apply to GET only, buffering instead"
            );
            Strategy::Buffered
        }
    }
}

// ── TransportParams ──────────────────────────────────────────────────

/// Parameters forwarded unchanged to the HTTP request.
#[derive(Debug, Clone, Default)]
pub struct TransportParams {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

// ── RequestOptions ───────────────────────────────────────────────────

/// Options for one invocation of a path handle.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Required; dispatch fails without it.
    pub method: Option<Method>,
    pub present: Presentation,
    pub return_type: ReturnType,
    /// Overrides the client's default timeout for this request.
    pub timeout: Option<Duration>,
    /// Stop an event stream after this many events.
    pub max_events: Option<usize>,
    pub transport: TransportParams,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn present(mut self, present: Presentation) -> Self {
        self.present = present;
        self
    }

    pub fn return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_events(mut self, max_events: usize) -> Self {
        self.max_events = Some(max_events);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.transport.headers.append(name, value);
        self
    }

    /// Add a header from strings, validating both halves.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Configuration(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Configuration(format!("invalid value for header '{name}': {e}")))?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.transport.body = Some(body.into());
        self
    }
}
