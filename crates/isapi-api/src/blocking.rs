//! Blocking facade over the async client.
//!
//! Each [`Client`] owns a single-threaded tokio runtime and drives the async
//! client on it, so the API mirrors the async one with plain return values
//! and [`Iterator`]s in place of streams.
//!
//! Do not call into this module from within an async runtime; use the async
//! [`crate::Client`] there instead.
//!
//! ```rust,ignore
//! let client = isapi_api::blocking::Client::new("http://192.168.1.64", "admin", "password")?;
//! let info = client.at("System/deviceInfo").get()?;
//!
//! for event in client.at("Event/notification/alertStream").stream()?.take(5) {
//!     println!("{}", event?.into_value());
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::runtime::Runtime;
use url::Url;

use crate::auth::AuthScheme;
use crate::client::ClientBuilder;
use crate::dispatch;
use crate::error::Error;
use crate::normalize::Normalized;
use crate::options::RequestOptions;
use crate::stream::{EventStream, OpaqueStream};

// ── Client ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Client {
    inner: crate::Client,
    runtime: Arc<Runtime>,
}

impl Client {
    pub fn new(
        host: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::from_async(crate::Client::new(host, login, password)?)
    }

    pub fn from_builder(builder: ClientBuilder) -> Result<Self, Error> {
        Self::from_async(builder.build()?)
    }

    /// Wrap an existing async client; auth state is shared with it.
    pub fn from_async(inner: crate::Client) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        Ok(Self {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    pub fn as_async(&self) -> &crate::Client {
        &self.inner
    }

    pub fn root(&self) -> PathHandle {
        self.wrap(self.inner.root())
    }

    pub fn segment(&self, name: impl Into<String>) -> PathHandle {
        self.wrap(self.inner.segment(name))
    }

    pub fn at(&self, path: &str) -> PathHandle {
        self.wrap(self.inner.at(path))
    }

    pub fn ensure_authenticated(&self) -> Result<AuthScheme, Error> {
        self.runtime.block_on(self.inner.ensure_authenticated())
    }

    pub fn auth_scheme(&self) -> Option<AuthScheme> {
        self.inner.auth_scheme()
    }

    pub fn reset_auth(&self) {
        self.inner.reset_auth();
    }

    fn wrap(&self, inner: crate::PathHandle) -> PathHandle {
        PathHandle {
            inner,
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("blocking::Client").field(&self.inner).finish()
    }
}

// ── PathHandle ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PathHandle {
    inner: crate::PathHandle,
    runtime: Arc<Runtime>,
}

impl PathHandle {
    #[must_use]
    pub fn segment(&self, name: impl Into<String>) -> Self {
        Self {
            inner: self.inner.segment(name),
            runtime: Arc::clone(&self.runtime),
        }
    }

    #[must_use]
    pub fn index(&self, value: impl fmt::Display) -> Self {
        self.segment(value.to_string())
    }

    pub fn path(&self) -> String {
        self.inner.path()
    }

    pub fn url(&self) -> Result<Url, Error> {
        self.inner.url()
    }

    pub fn invoke(&self, options: RequestOptions) -> Result<Reply, Error> {
        let reply = self.runtime.block_on(self.inner.invoke(options))?;
        Ok(match reply {
            dispatch::Reply::Body(body) => Reply::Body(body),
            dispatch::Reply::Events(stream) => Reply::Events(self.events(stream)),
            dispatch::Reply::Opaque(stream) => Reply::Opaque(self.chunks(stream)),
        })
    }

    pub fn get(&self) -> Result<Normalized, Error> {
        self.runtime.block_on(self.inner.get())
    }

    pub fn get_text(&self) -> Result<String, Error> {
        self.runtime.block_on(self.inner.get_text())
    }

    pub fn put(&self, body: impl Into<Bytes>) -> Result<Normalized, Error> {
        self.runtime.block_on(self.inner.put(body))
    }

    pub fn post(&self, body: impl Into<Bytes>) -> Result<Normalized, Error> {
        self.runtime.block_on(self.inner.post(body))
    }

    pub fn delete(&self) -> Result<Normalized, Error> {
        self.runtime.block_on(self.inner.delete())
    }

    pub fn stream(&self) -> Result<Events, Error> {
        let stream = self.runtime.block_on(self.inner.stream())?;
        Ok(self.events(stream))
    }

    pub fn opaque(&self) -> Result<Chunks, Error> {
        let stream = self.runtime.block_on(self.inner.opaque())?;
        Ok(self.chunks(stream))
    }

    fn events(&self, stream: EventStream) -> Events {
        Events {
            stream,
            runtime: Arc::clone(&self.runtime),
        }
    }

    fn chunks(&self, stream: OpaqueStream) -> Chunks {
        Chunks {
            stream,
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl PartialEq for PathHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl fmt::Debug for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

// ── Replies ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Reply {
    Body(Normalized),
    Events(Events),
    Opaque(Chunks),
}

/// Blocking iterator over streamed events. Dropping it closes the
/// connection.
pub struct Events {
    stream: EventStream,
    runtime: Arc<Runtime>,
}

impl Iterator for Events {
    type Item = Result<Normalized, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Events").field(&self.stream).finish()
    }
}

/// Blocking iterator over opaque body chunks.
pub struct Chunks {
    stream: OpaqueStream,
    runtime: Arc<Runtime>,
}

impl Chunks {
    pub fn content_type(&self) -> Option<&str> {
        self.stream.content_type()
    }

    /// Read the rest of the body into memory.
    pub fn collect_bytes(self) -> Result<Bytes, Error> {
        self.runtime.block_on(self.stream.collect_bytes())
    }
}

impl Iterator for Chunks {
    type Item = Result<Bytes, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

impl fmt::Debug for Chunks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Chunks").field(&self.stream).finish()
    }
}
